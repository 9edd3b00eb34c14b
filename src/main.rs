// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use stage_arbiter::arbiter::Arbiter;
use stage_arbiter::config::StageConfig;
use stage_arbiter::effects::catalog::EffectKind;
use stage_arbiter::effects::manager::EffectTrigger;
use stage_arbiter::providers::{ColorWheelIntent, LogSink, MetronomeContext, StaticPatch};
use stage_arbiter::runner::TickLoop;
use stage_arbiter::shared::SharedArbiter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A real-time lighting control arbiter."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the arbiter against a generated show and logs every frame.
    Run {
        /// The path to the stage configuration file.
        config: PathBuf,
        /// How long to run. Runs until killed if unset.
        #[arg(long)]
        duration: Option<String>,
        /// Selects a vibe from the configuration file.
        #[arg(long)]
        vibe: Option<String>,
        /// Tempo of the generated show.
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
        /// Effects to fire once the show starts.
        #[arg(long = "trigger")]
        triggers: Vec<String>,
    },
    /// Validates a configuration file and prints the resolved settings.
    Check {
        /// The path to the stage configuration file.
        config: PathBuf,
    },
    /// Lists the effect catalog.
    Effects {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            duration,
            vibe,
            bpm,
            triggers,
        } => {
            let stage = StageConfig::deserialize(&config)?;
            let arbiter_config = stage.arbiter()?;
            let period = arbiter_config.frame_period();

            let vibes = Arc::new(stage.vibe_library());
            if let Some(vibe) = vibe {
                if !vibes.select(&vibe) {
                    return Err(format!("unknown vibe {}, known vibes: {:?}", vibe, vibes.ids()).into());
                }
            }

            let mut arbiter = Arbiter::new(arbiter_config);
            arbiter.set_vibe_provider(vibes);
            let shared = SharedArbiter::new(arbiter);

            let tick_loop = TickLoop::new(shared.clone(), Box::new(LogSink::new(30)))
                .with_patch(Box::new(StaticPatch::new(stage.fixtures())))
                .with_context(Box::new(MetronomeContext::new(bpm, period)))
                .with_intent(Box::new(ColorWheelIntent::new(15.0)));
            let cancel_handle = tick_loop.cancel_handle();
            let join = tick_loop.spawn();

            for trigger in triggers {
                let kind = trigger.parse::<EffectKind>()?;
                let request = EffectTrigger::new(kind).source("cli").bpm(bpm);
                match shared.lock().trigger_effect(request) {
                    Ok(outcome) => info!(effect = kind.as_str(), ?outcome, "Triggered effect"),
                    Err(e) => warn!(effect = kind.as_str(), err = e.to_string(), "Unable to trigger effect"),
                }
            }

            match duration {
                Some(duration) => {
                    let duration: Duration = DurationString::from_string(duration)?.into();
                    cancel_handle.wait_timeout(duration);
                    cancel_handle.cancel();
                }
                None => cancel_handle.wait(),
            }

            let frames = join.join().map_err(|_| "tick loop panicked")?;
            let status = shared.lock().status();
            info!(frames, "Run finished");
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Check { config } => {
            let stage = StageConfig::deserialize(&config)?;
            let arbiter_config = stage.arbiter()?;
            println!("{}", serde_yml::to_string(&arbiter_config)?);

            let vibes = stage.vibe_library();
            println!(
                "Vibes: {:?} (active: {})",
                vibes.ids(),
                vibes.active_id().unwrap_or_else(|| "none".to_string())
            );

            let mut arbiter = Arbiter::new(arbiter_config);
            arbiter.set_fixtures(stage.fixtures());
            arbiter.set_vibe_provider(Arc::new(vibes));
            let target = arbiter.arbitrate(Duration::ZERO);
            println!("{}", serde_json::to_string_pretty(&target)?);
        }
        Commands::Effects {} => {
            println!(
                "{:<14} {:<10} {:>8} {:<12} {:<7} {:>10}",
                "effect", "category", "priority", "bus", "zone", "duration"
            );
            for kind in EffectKind::ALL {
                let traits = kind.traits();
                println!(
                    "{:<14} {:<10} {:>8} {:<12} {:<7} {:>10}",
                    kind.as_str(),
                    format!("{:?}", traits.category).to_lowercase(),
                    traits.priority,
                    format!("{:?}", traits.mix_bus).to_lowercase(),
                    traits
                        .energy_zone
                        .map(|zone| zone.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    format!("{:?}", traits.nominal_duration),
                );
            }
        }
    };

    Ok(())
}
