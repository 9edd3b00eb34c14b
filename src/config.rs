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
//! YAML configuration: arbiter settings, the fixture patch and vibe profiles.
use std::collections::HashSet;
use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;

use crate::arbiter::types::Fixture;
use crate::effects::shield::{VibeLibrary, VibeProfile};

use self::arbiter::ArbiterSection;
use self::fixture::FixtureConfig;

mod arbiter;
mod error;
mod fixture;

pub use self::arbiter::ArbiterConfig;
pub use self::error::ConfigError;

/// A YAML representation of the vibe section.
#[derive(Deserialize, Clone, Default)]
struct Vibes {
    active: Option<String>,
    #[serde(default)]
    profiles: Vec<VibeProfile>,
}

/// The whole configuration file. Every section is optional.
#[derive(Deserialize, Clone, Default)]
pub struct StageConfig {
    #[serde(default)]
    arbiter: ArbiterSection,
    #[serde(default)]
    fixtures: Vec<FixtureConfig>,
    #[serde(default)]
    vibes: Vibes,
}

impl StageConfig {
    /// Parse and validate a configuration file.
    pub fn deserialize(path: &Path) -> Result<StageConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<StageConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<StageConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<StageConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the cross-field rules serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arbiter.to_config()?;

        let mut ids = HashSet::new();
        for fixture in &self.fixtures {
            if !ids.insert(fixture.id()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate fixture id: {}",
                    fixture.id()
                )));
            }
        }

        let mut vibe_ids = HashSet::new();
        for profile in &self.vibes.profiles {
            profile.validate().map_err(ConfigError::Invalid)?;
            if !vibe_ids.insert(profile.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate vibe id: {}",
                    profile.id
                )));
            }
        }
        if let Some(active) = &self.vibes.active {
            if !vibe_ids.contains(active.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "active vibe {} is not defined",
                    active
                )));
            }
        }
        Ok(())
    }

    pub fn arbiter(&self) -> Result<ArbiterConfig, ConfigError> {
        self.arbiter.to_config()
    }

    pub fn fixtures(&self) -> Vec<Fixture> {
        self.fixtures.iter().map(FixtureConfig::to_fixture).collect()
    }

    /// The configured vibe profiles with the configured active selection.
    pub fn vibe_library(&self) -> VibeLibrary {
        VibeLibrary::new(self.vibes.profiles.clone(), self.vibes.active.clone())
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::io::Write;
    use std::time::Duration;

    use crate::arbiter::types::{ChannelType, FixtureCapabilities};
    use crate::effects::shield::VibeProvider;
    use crate::effects::EffectKind;

    use super::*;

    const FULL: &str = r#"
        arbiter:
          default_crossfade: 750ms
          max_manual_overrides: 4
          max_active_effects: 3
          consciousness_enabled: true
          frame_rate_hz: 40
        fixtures:
          - id: front-1
            zone: front
            type: par
            channels: [dimmer, red, green, blue]
          - id: mover-1
            zone: movers
            type: moving_head
            channels: [dimmer, pan, tilt, zoom]
        vibes:
          active: club
          profiles:
            - id: club
              allowed: [strobe_storm, solar_flare]
              max_strobe_rate: 15
              max_intensity: 1.0
            - id: lounge
              allowed: [ghost_breath]
              max_strobe_rate: 0
              max_intensity: 0.4
              allow_dynamic: false
    "#;

    #[test]
    fn parses_full_file() -> Result<(), Box<dyn Error>> {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
        file.write_all(FULL.as_bytes())?;
        let config = StageConfig::deserialize(file.path())?;

        let arbiter = config.arbiter()?;
        assert_eq!(arbiter.default_crossfade, Duration::from_millis(750));
        assert_eq!(arbiter.max_manual_overrides, 4);
        assert_eq!(arbiter.max_active_effects, 3);
        assert!(arbiter.consciousness_enabled);
        assert!((arbiter.frame_period().as_secs_f64() - 0.025).abs() < 1e-6);

        let fixtures = config.fixtures();
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[1].zone, "movers");
        assert!(fixtures[1].capabilities.contains(FixtureCapabilities::MOVEMENT));
        assert!(!fixtures[1].capabilities.contains(FixtureCapabilities::COLOR));
        assert_eq!(fixtures[0].channels[1], ChannelType::Red);

        let vibes = config.vibe_library();
        let active = vibes.active_vibe().ok_or("no active vibe")?;
        assert_eq!(active.id, "club");
        assert!(active.allowed.contains(&EffectKind::StrobeStorm));
        assert!(vibes.select("lounge"));
        let lounge = vibes.active_vibe().ok_or("no active vibe")?;
        assert!(!lounge.allow_dynamic);
        Ok(())
    }

    #[test]
    fn empty_file_uses_defaults() -> Result<(), Box<dyn Error>> {
        let config = StageConfig::from_yaml("{}")?;
        assert_eq!(config.arbiter()?, ArbiterConfig::default());
        assert!(config.fixtures().is_empty());
        assert!(config.vibe_library().active_vibe().is_none());
        Ok(())
    }

    #[test]
    fn rejects_duplicate_fixtures() {
        let yaml = r#"
            fixtures:
              - { id: a, channels: [dimmer] }
              - { id: a, channels: [dimmer] }
        "#;
        assert!(matches!(
            StageConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_bad_frame_rate() {
        let yaml = "arbiter:\n  frame_rate_hz: 0\n";
        assert!(matches!(
            StageConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_intensity() {
        let yaml = r#"
            vibes:
              profiles:
                - { id: hot, max_intensity: 1.5 }
        "#;
        assert!(matches!(
            StageConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_undefined_active_vibe() {
        let yaml = "vibes:\n  active: missing\n";
        assert!(matches!(
            StageConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unknown_channel() {
        let yaml = r#"
            fixtures:
              - { id: a, channels: [dimmer, gobo] }
        "#;
        assert!(matches!(
            StageConfig::from_yaml(yaml),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn rejects_bad_crossfade() {
        let yaml = "arbiter:\n  default_crossfade: soon\n";
        assert!(matches!(
            StageConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }
}
