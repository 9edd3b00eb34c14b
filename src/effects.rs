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
//! Short-lived visual effects layered on top of the mixer.
//!
//! Each effect is an independent state machine implementing [`LightEffect`].
//! The [`manager::EffectManager`] decides which effects may run, advances them
//! each frame and composites their outputs into a single effects layer.
use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::color::Hsl;

pub mod catalog;
mod error;
pub mod library;
pub mod manager;
pub mod phase;
pub mod shield;
pub mod traffic;

pub use catalog::EffectKind;
pub use error::EffectError;

/// Whether an effect blends with the base layers or replaces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixBus {
    #[default]
    Additive,
    /// Replace the base entirely; unspecified light channels go to safe-zero.
    Dictatorial,
}

/// How a zone entry combines with the global effect values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneBlend {
    #[default]
    Replace,
    Max,
}

/// Movement requested by an effect. Pan and tilt are -1 to 1: absolute values
/// map across the full range, relative values offset the underlying position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MovementOutput {
    pub pan: f64,
    pub tilt: f64,
    pub absolute: bool,
    pub speed: Option<f64>,
}

impl MovementOutput {
    pub fn relative(pan: f64, tilt: f64) -> MovementOutput {
        MovementOutput {
            pan,
            tilt,
            absolute: false,
            speed: None,
        }
    }
}

/// One zone's share of an effect frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ZoneOutput {
    pub dimmer: Option<f64>,
    pub color: Option<Hsl>,
    pub white: Option<f64>,
    pub amber: Option<f64>,
    pub movement: Option<MovementOutput>,
    pub blend: ZoneBlend,
}

/// One frame of an effect. Intensities are 0-1; `None` leaves a channel alone.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EffectOutput {
    pub dimmer: Option<f64>,
    pub color: Option<Hsl>,
    pub white: Option<f64>,
    pub amber: Option<f64>,
    pub strobe_rate: Option<f64>,
    pub movement: Option<MovementOutput>,
    /// Zones the global fields apply to. Empty means every zone.
    pub zones: Vec<String>,
    pub zone_overrides: BTreeMap<String, ZoneOutput>,
}

impl EffectOutput {
    /// True when the global fields reach fixtures in this zone.
    pub fn covers_zone(&self, zone: &str) -> bool {
        self.zones.is_empty() || self.zones.iter().any(|z| z == zone)
    }
}

/// Limits the shield places on a degraded effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectConstraints {
    pub max_strobe_rate: f64,
    pub max_intensity: f64,
    pub degraded: bool,
}

impl Default for EffectConstraints {
    fn default() -> Self {
        EffectConstraints {
            max_strobe_rate: f64::INFINITY,
            max_intensity: 1.0,
            degraded: false,
        }
    }
}

/// Everything an effect learns when it is triggered.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerContext {
    pub intensity: f64,
    pub zones: Vec<String>,
    pub source: String,
    pub bpm: Option<f64>,
    /// Spectral harshness of the music, 0-1.
    pub harshness: Option<f64>,
    /// Seed for any pseudo-random variation.
    pub seed: u64,
}

impl Default for TriggerContext {
    fn default() -> Self {
        TriggerContext {
            intensity: 1.0,
            zones: Vec::new(),
            source: "system".to_string(),
            bpm: None,
            harshness: None,
            seed: 0,
        }
    }
}

/// The contract every effect implements.
///
/// Instances are single-use: construct a new one per trigger. Phase changes
/// must depend only on the time fed through `update`.
pub trait LightEffect: Send {
    fn kind(&self) -> EffectKind;

    /// Resets phase state and captures the trigger context.
    fn trigger(&mut self, context: &TriggerContext);

    /// Advances the effect by `delta`.
    fn update(&mut self, delta: Duration);

    /// The current frame, or `None` when this phase contributes nothing.
    fn output(&self) -> Option<EffectOutput>;

    fn is_finished(&self) -> bool;

    /// Finishes immediately. No further output is produced.
    fn abort(&mut self);

    /// Name of the current phase, for diagnostics.
    fn phase(&self) -> &'static str;

    /// Expected running time from trigger to finish.
    fn expected_duration(&self) -> Duration;

    /// Receives shield constraints before `trigger`. Effects that can strobe or
    /// run hot must honour them.
    fn apply_constraints(&mut self, _constraints: &EffectConstraints) {}
}
