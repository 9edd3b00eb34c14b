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
//! The built-in effects and the factory registry that builds them.
use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{EffectError, EffectKind, LightEffect};

pub mod binary_glitch;
pub mod clave_rhythm;
pub mod cumbia_moon;
pub mod freeze;
pub mod ghost_breath;
pub mod seismic_snap;
pub mod solar_flare;
pub mod strobe_storm;
pub mod tidal_wave;

use binary_glitch::BinaryGlitchParams;
use clave_rhythm::ClaveRhythmParams;
use cumbia_moon::CumbiaMoonParams;
use freeze::FreezeParams;
use ghost_breath::GhostBreathParams;
use seismic_snap::SeismicSnapParams;
use solar_flare::SolarFlareParams;
use strobe_storm::StrobeStormParams;
use tidal_wave::TidalWaveParams;

/// Typed parameters for every effect, tagged by effect type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectParams {
    StrobeStorm(StrobeStormParams),
    SolarFlare(SolarFlareParams),
    SeismicSnap(SeismicSnapParams),
    TidalWave(TidalWaveParams),
    GhostBreath(GhostBreathParams),
    CumbiaMoon(CumbiaMoonParams),
    BinaryGlitch(BinaryGlitchParams),
    ClaveRhythm(ClaveRhythmParams),
    Freeze(FreezeParams),
}

impl EffectParams {
    pub fn kind(&self) -> EffectKind {
        match self {
            EffectParams::StrobeStorm(_) => EffectKind::StrobeStorm,
            EffectParams::SolarFlare(_) => EffectKind::SolarFlare,
            EffectParams::SeismicSnap(_) => EffectKind::SeismicSnap,
            EffectParams::TidalWave(_) => EffectKind::TidalWave,
            EffectParams::GhostBreath(_) => EffectKind::GhostBreath,
            EffectParams::CumbiaMoon(_) => EffectKind::CumbiaMoon,
            EffectParams::BinaryGlitch(_) => EffectKind::BinaryGlitch,
            EffectParams::ClaveRhythm(_) => EffectKind::ClaveRhythm,
            EffectParams::Freeze(_) => EffectKind::Freeze,
        }
    }

    /// Default parameters for an effect type.
    pub fn defaults(kind: EffectKind) -> EffectParams {
        match kind {
            EffectKind::StrobeStorm => EffectParams::StrobeStorm(Default::default()),
            EffectKind::SolarFlare => EffectParams::SolarFlare(Default::default()),
            EffectKind::SeismicSnap => EffectParams::SeismicSnap(Default::default()),
            EffectKind::TidalWave => EffectParams::TidalWave(Default::default()),
            EffectKind::GhostBreath => EffectParams::GhostBreath(Default::default()),
            EffectKind::CumbiaMoon => EffectParams::CumbiaMoon(Default::default()),
            EffectKind::BinaryGlitch => EffectParams::BinaryGlitch(Default::default()),
            EffectKind::ClaveRhythm => EffectParams::ClaveRhythm(Default::default()),
            EffectKind::Freeze => EffectParams::Freeze(Default::default()),
        }
    }
}

/// Builds an effect instance from its parameters.
pub type EffectFactory = fn(&EffectParams) -> Result<Box<dyn LightEffect>, EffectError>;

/// Factories keyed by effect type.
pub struct EffectRegistry {
    factories: HashMap<EffectKind, EffectFactory>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        EffectRegistry::builtin()
    }
}

impl EffectRegistry {
    pub fn empty() -> EffectRegistry {
        EffectRegistry {
            factories: HashMap::new(),
        }
    }

    /// A registry holding every built-in effect.
    pub fn builtin() -> EffectRegistry {
        let mut registry = EffectRegistry::empty();
        registry.register(EffectKind::StrobeStorm, strobe_storm::create);
        registry.register(EffectKind::SolarFlare, solar_flare::create);
        registry.register(EffectKind::SeismicSnap, seismic_snap::create);
        registry.register(EffectKind::TidalWave, tidal_wave::create);
        registry.register(EffectKind::GhostBreath, ghost_breath::create);
        registry.register(EffectKind::CumbiaMoon, cumbia_moon::create);
        registry.register(EffectKind::BinaryGlitch, binary_glitch::create);
        registry.register(EffectKind::ClaveRhythm, clave_rhythm::create);
        registry.register(EffectKind::Freeze, freeze::create);
        registry
    }

    pub fn register(&mut self, kind: EffectKind, factory: EffectFactory) {
        self.factories.insert(kind, factory);
    }

    pub fn contains(&self, kind: EffectKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn create(&self, params: &EffectParams) -> Result<Box<dyn LightEffect>, EffectError> {
        let kind = params.kind();
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| EffectError::UnknownEffect(kind.to_string()))?;
        factory(params)
    }
}

fn mismatched(expected: EffectKind, params: &EffectParams) -> EffectError {
    EffectError::InvalidParameter(format!(
        "{} factory given {} parameters",
        expected,
        params.kind()
    ))
}

/// Longest timeline a single effect may ask for.
pub const MAX_EFFECT_DURATION: Duration = Duration::from_secs(60 * 60);
/// Tempo range effects will lock to.
pub const MIN_BPM: f64 = 1.0;
pub const MAX_BPM: f64 = 1000.0;

pub(crate) fn sane_bpm(bpm: f64) -> bool {
    (MIN_BPM..=MAX_BPM).contains(&bpm)
}

fn require_bpm(bpm: f64) -> Result<(), EffectError> {
    if sane_bpm(bpm) {
        Ok(())
    } else {
        Err(EffectError::InvalidParameter(format!(
            "bpm must be within {}-{}, got {}",
            MIN_BPM, MAX_BPM, bpm
        )))
    }
}

/// Rejects phase lengths whose sum overflows or exceeds the longest timeline.
fn require_timeline(name: &str, parts_ms: &[u64]) -> Result<(), EffectError> {
    let total = parts_ms
        .iter()
        .try_fold(0u64, |sum, ms| sum.checked_add(*ms));
    match total {
        Some(total) if Duration::from_millis(total) <= MAX_EFFECT_DURATION => Ok(()),
        _ => Err(EffectError::InvalidParameter(format!(
            "{} must total at most {}s",
            name,
            MAX_EFFECT_DURATION.as_secs()
        ))),
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), EffectError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EffectError::InvalidParameter(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}
