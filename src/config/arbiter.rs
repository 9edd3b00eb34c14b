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
use std::time::Duration;

use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

pub const DEFAULT_CROSSFADE: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_MANUAL_OVERRIDES: usize = 64;
pub const DEFAULT_MAX_ACTIVE_EFFECTS: usize = 8;
pub const DEFAULT_FRAME_RATE_HZ: f64 = 30.0;

/// Runtime settings for the arbiter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbiterConfig {
    /// Release fade used when an override does not name its own.
    pub default_crossfade: Duration,
    /// Fixtures that may hold a manual override at once.
    pub max_manual_overrides: usize,
    /// Effects that may run at once.
    pub max_active_effects: usize,
    pub consciousness_enabled: bool,
    pub frame_rate_hz: f64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        ArbiterConfig {
            default_crossfade: DEFAULT_CROSSFADE,
            max_manual_overrides: DEFAULT_MAX_MANUAL_OVERRIDES,
            max_active_effects: DEFAULT_MAX_ACTIVE_EFFECTS,
            consciousness_enabled: false,
            frame_rate_hz: DEFAULT_FRAME_RATE_HZ,
        }
    }
}

impl ArbiterConfig {
    /// The tick period implied by the frame rate. A rate that is not a
    /// positive finite number falls back to the default rate.
    pub fn frame_period(&self) -> Duration {
        let default_period = Duration::from_secs_f64(1.0 / DEFAULT_FRAME_RATE_HZ);
        if !self.frame_rate_hz.is_finite() || self.frame_rate_hz <= 0.0 {
            return default_period;
        }
        Duration::try_from_secs_f64(1.0 / self.frame_rate_hz).unwrap_or(default_period)
    }
}

/// A YAML representation of the arbiter section.
#[derive(Deserialize, Clone, Default)]
pub(crate) struct ArbiterSection {
    /// Release fade, as a duration string such as `500ms`.
    default_crossfade: Option<String>,
    max_manual_overrides: Option<usize>,
    max_active_effects: Option<usize>,
    consciousness_enabled: Option<bool>,
    frame_rate_hz: Option<f64>,
}

impl ArbiterSection {
    /// Resolves the section against the defaults.
    pub(crate) fn to_config(&self) -> Result<ArbiterConfig, ConfigError> {
        let default_crossfade = match &self.default_crossfade {
            Some(duration) => DurationString::from_string(duration.clone())
                .map_err(|e| {
                    ConfigError::Invalid(format!("default_crossfade {}: {}", duration, e))
                })?
                .into(),
            None => DEFAULT_CROSSFADE,
        };

        let frame_rate_hz = self.frame_rate_hz.unwrap_or(DEFAULT_FRAME_RATE_HZ);
        if !frame_rate_hz.is_finite() || frame_rate_hz <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "frame_rate_hz must be positive, got {}",
                frame_rate_hz
            )));
        }

        Ok(ArbiterConfig {
            default_crossfade,
            max_manual_overrides: self
                .max_manual_overrides
                .unwrap_or(DEFAULT_MAX_MANUAL_OVERRIDES),
            max_active_effects: self
                .max_active_effects
                .unwrap_or(DEFAULT_MAX_ACTIVE_EFFECTS),
            consciousness_enabled: self.consciousness_enabled.unwrap_or(false),
            frame_rate_hz,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unusable_frame_rates_fall_back_to_the_default_period() {
        let default_period = ArbiterConfig::default().frame_period();
        for frame_rate_hz in [0.0, -30.0, f64::NAN, f64::INFINITY, 1e-320] {
            let config = ArbiterConfig {
                frame_rate_hz,
                ..Default::default()
            };
            assert_eq!(config.frame_period(), default_period, "{}", frame_rate_hz);
        }

        let config = ArbiterConfig {
            frame_rate_hz: 50.0,
            ..Default::default()
        };
        assert!((config.frame_period().as_secs_f64() - 0.02).abs() < 1e-9);
    }
}
