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
use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{mismatched, require_timeline, EffectParams};
use crate::color::Hsl;
use crate::effects::phase::{Phase, PhaseClock};
use crate::effects::{
    EffectConstraints, EffectError, EffectKind, EffectOutput, LightEffect, TriggerContext,
    ZoneBlend, ZoneOutput,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidalWaveParams {
    /// Zones in the order the wave crosses them. Trigger zones take precedence.
    pub zones: Vec<String>,
    /// Time for the crest to move from one zone to the next.
    pub step_ms: u64,
    pub color: Hsl,
}

impl Default for TidalWaveParams {
    fn default() -> Self {
        TidalWaveParams {
            zones: vec!["front".to_string(), "center".to_string(), "back".to_string()],
            step_ms: 400,
            color: Hsl::new(190.0, 0.9, 0.5),
        }
    }
}

/// A crest of light rolling zone by zone. Each zone brightens as the crest
/// approaches and falls away behind it.
pub struct TidalWave {
    params: TidalWaveParams,
    zones: Vec<String>,
    clock: PhaseClock,
    constraints: EffectConstraints,
    context: TriggerContext,
}

pub fn create(params: &EffectParams) -> Result<Box<dyn LightEffect>, EffectError> {
    let EffectParams::TidalWave(params) = params else {
        return Err(mismatched(EffectKind::TidalWave, params));
    };
    if params.step_ms == 0 {
        return Err(EffectError::InvalidParameter(
            "step_ms must be non-zero".to_string(),
        ));
    }
    require_timeline("step_ms", &[params.step_ms])?;
    Ok(Box::new(TidalWave::new(params.clone())))
}

fn wave_clock(zone_count: usize, step_ms: u64) -> PhaseClock {
    let travel = step_ms.saturating_mul(zone_count.saturating_sub(1) as u64);
    PhaseClock::open_ended(vec![
        Phase::millis("travel", travel),
        Phase::millis("ebb", step_ms),
    ])
}

impl TidalWave {
    pub fn new(params: TidalWaveParams) -> TidalWave {
        let zones = params.zones.clone();
        let clock = wave_clock(zones.len(), params.step_ms);
        TidalWave {
            params,
            zones,
            clock,
            constraints: EffectConstraints::default(),
            context: TriggerContext::default(),
        }
    }

    fn crest(&self) -> f64 {
        self.clock.elapsed().as_micros() as f64 / (self.params.step_ms * 1000) as f64
    }
}

impl LightEffect for TidalWave {
    fn kind(&self) -> EffectKind {
        EffectKind::TidalWave
    }

    fn trigger(&mut self, context: &TriggerContext) {
        self.context = context.clone();
        if !context.zones.is_empty() {
            self.zones = context.zones.clone();
        }
        self.clock = wave_clock(self.zones.len(), self.params.step_ms);
    }

    fn update(&mut self, delta: Duration) {
        self.clock.advance(delta);
        // The wave is done once the crest has passed the last zone by a full step.
        if self.clock.elapsed() >= self.clock.total() {
            self.clock.finish();
        }
    }

    fn output(&self) -> Option<EffectOutput> {
        self.clock.position()?;
        let crest = self.crest();
        let peak = self
            .context
            .intensity
            .clamp(0.0, 1.0)
            .min(self.constraints.max_intensity);

        let zone_overrides: BTreeMap<String, ZoneOutput> = self
            .zones
            .iter()
            .enumerate()
            .map(|(index, zone)| {
                let level = (1.0 - (crest - index as f64).abs()).max(0.0) * peak;
                (
                    zone.clone(),
                    ZoneOutput {
                        dimmer: Some(level),
                        color: Some(self.params.color),
                        blend: ZoneBlend::Max,
                        ..Default::default()
                    },
                )
            })
            .collect();

        Some(EffectOutput {
            zones: self.zones.clone(),
            zone_overrides,
            ..Default::default()
        })
    }

    fn is_finished(&self) -> bool {
        self.clock.is_finished()
    }

    fn abort(&mut self) {
        self.clock.finish();
    }

    fn phase(&self) -> &'static str {
        self.clock.phase_name()
    }

    fn expected_duration(&self) -> Duration {
        self.clock.total()
    }

    fn apply_constraints(&mut self, constraints: &EffectConstraints) {
        self.constraints = *constraints;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn zone_dimmer(output: &EffectOutput, zone: &str) -> f64 {
        output.zone_overrides[zone].dimmer.unwrap()
    }

    #[test]
    fn crest_moves_through_zones() {
        let mut wave = TidalWave::new(TidalWaveParams::default());
        wave.trigger(&TriggerContext::default());

        let start = wave.output().unwrap();
        assert_eq!(zone_dimmer(&start, "front"), 1.0);
        assert_eq!(zone_dimmer(&start, "back"), 0.0);

        wave.update(Duration::from_millis(400));
        let middle = wave.output().unwrap();
        assert_eq!(zone_dimmer(&middle, "front"), 0.0);
        assert_eq!(zone_dimmer(&middle, "center"), 1.0);

        wave.update(Duration::from_millis(200));
        let between = wave.output().unwrap();
        assert!((zone_dimmer(&between, "center") - 0.5).abs() < 1e-9);
        assert!((zone_dimmer(&between, "back") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn trigger_zones_replace_defaults() {
        let mut wave = TidalWave::new(TidalWaveParams::default());
        wave.trigger(&TriggerContext {
            zones: vec!["left".to_string(), "right".to_string()],
            ..Default::default()
        });
        assert_eq!(wave.expected_duration(), Duration::from_millis(800));
        let output = wave.output().unwrap();
        assert!(output.zone_overrides.contains_key("left"));
        assert!(!output.zone_overrides.contains_key("front"));

        wave.update(Duration::from_millis(800));
        assert!(wave.is_finished());
    }
}
