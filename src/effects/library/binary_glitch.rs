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

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{mismatched, require_timeline, EffectParams};
use crate::color::Hsl;
use crate::effects::phase::{Phase, PhaseClock};
use crate::effects::{
    EffectConstraints, EffectError, EffectKind, EffectOutput, LightEffect, TriggerContext,
};

/// Slot length used when strobing is forbidden outright (1 Hz flicker).
const NO_STROBE_SLOT_MS: u64 = 500;
/// Most slots one glitch may draw.
const MAX_SLOTS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryGlitchParams {
    pub duration_ms: u64,
    pub slot_ms: u64,
    /// Chance that a slot is lit, 0-1.
    pub density: f64,
}

impl Default for BinaryGlitchParams {
    fn default() -> Self {
        BinaryGlitchParams {
            duration_ms: 1200,
            slot_ms: 50,
            density: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Slot {
    lit: bool,
    hue: f64,
}

/// Data-corruption stutter: the timeline is cut into slots that are randomly
/// lit in cyan or magenta. The pattern is drawn at trigger time from the
/// trigger seed, so the same seed always glitches the same way.
pub struct BinaryGlitch {
    params: BinaryGlitchParams,
    clock: PhaseClock,
    constraints: EffectConstraints,
    context: TriggerContext,
    slot_ms: u64,
    slots: Vec<Slot>,
}

pub fn create(params: &EffectParams) -> Result<Box<dyn LightEffect>, EffectError> {
    let EffectParams::BinaryGlitch(params) = params else {
        return Err(mismatched(EffectKind::BinaryGlitch, params));
    };
    if params.slot_ms == 0 || params.duration_ms == 0 {
        return Err(EffectError::InvalidParameter(
            "glitch slots and duration must be non-zero".to_string(),
        ));
    }
    require_timeline("duration_ms", &[params.duration_ms])?;
    if params.duration_ms.div_ceil(params.slot_ms) > MAX_SLOTS {
        return Err(EffectError::InvalidParameter(format!(
            "glitch may have at most {} slots, raise slot_ms",
            MAX_SLOTS
        )));
    }
    if !(0.0..=1.0).contains(&params.density) {
        return Err(EffectError::InvalidParameter(format!(
            "density must be 0-1, got {}",
            params.density
        )));
    }
    Ok(Box::new(BinaryGlitch::new(params.clone())))
}

impl BinaryGlitch {
    pub fn new(params: BinaryGlitchParams) -> BinaryGlitch {
        let clock = PhaseClock::new(vec![Phase::millis("glitch", params.duration_ms)]);
        BinaryGlitch {
            slot_ms: params.slot_ms,
            params,
            clock,
            constraints: EffectConstraints::default(),
            context: TriggerContext::default(),
            slots: Vec::new(),
        }
    }

    /// Equivalent strobe rate of the slot pattern.
    pub fn strobe_rate(&self) -> f64 {
        1000.0 / (2 * self.slot_ms) as f64
    }

    fn lit_pattern(&self) -> Vec<bool> {
        self.slots.iter().map(|slot| slot.lit).collect()
    }
}

impl LightEffect for BinaryGlitch {
    fn kind(&self) -> EffectKind {
        EffectKind::BinaryGlitch
    }

    fn trigger(&mut self, context: &TriggerContext) {
        self.clock.reset();
        self.context = context.clone();

        self.slot_ms = self.params.slot_ms;
        if self.constraints.degraded {
            if self.constraints.max_strobe_rate <= 0.0 {
                self.slot_ms = self.slot_ms.max(NO_STROBE_SLOT_MS);
            } else {
                let min_slot = (1000.0 / (2.0 * self.constraints.max_strobe_rate)).ceil() as u64;
                self.slot_ms = self.slot_ms.max(min_slot);
            }
        }

        let mut rng = StdRng::seed_from_u64(context.seed);
        let count = self.params.duration_ms.div_ceil(self.slot_ms);
        self.slots = (0..count)
            .map(|_| Slot {
                lit: rng.gen_bool(self.params.density),
                hue: if rng.gen_bool(0.5) { 180.0 } else { 300.0 },
            })
            .collect();
    }

    fn update(&mut self, delta: Duration) {
        self.clock.advance(delta);
    }

    fn output(&self) -> Option<EffectOutput> {
        self.clock.position()?;
        let index = (self.clock.elapsed().as_millis() / self.slot_ms as u128) as usize;
        let slot = self.slots.get(index)?;
        let level = self
            .context
            .intensity
            .clamp(0.0, 1.0)
            .min(self.constraints.max_intensity);
        Some(EffectOutput {
            dimmer: Some(if slot.lit { level } else { 0.0 }),
            color: Some(Hsl::new(slot.hue, 1.0, 0.5)),
            strobe_rate: Some(self.strobe_rate()),
            zones: self.context.zones.clone(),
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

    fn triggered(seed: u64) -> BinaryGlitch {
        let mut glitch = BinaryGlitch::new(BinaryGlitchParams::default());
        glitch.trigger(&TriggerContext {
            seed,
            ..Default::default()
        });
        glitch
    }

    #[test]
    fn same_seed_same_pattern() {
        assert_eq!(triggered(42).lit_pattern(), triggered(42).lit_pattern());
        assert_eq!(triggered(42).lit_pattern().len(), 24);
    }

    #[test]
    fn different_seeds_differ() {
        let patterns: Vec<Vec<bool>> = (0..4).map(|seed| triggered(seed).lit_pattern()).collect();
        assert!(patterns.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn degraded_slots_respect_strobe_cap() {
        let mut glitch = BinaryGlitch::new(BinaryGlitchParams::default());
        glitch.apply_constraints(&EffectConstraints {
            max_strobe_rate: 4.0,
            max_intensity: 1.0,
            degraded: true,
        });
        glitch.trigger(&TriggerContext::default());
        assert!(glitch.strobe_rate() <= 4.0);
    }

    #[test]
    fn output_follows_slots() {
        let mut glitch = triggered(7);
        let pattern = glitch.lit_pattern();
        for (index, lit) in pattern.iter().enumerate().take(10) {
            let output = glitch.output().unwrap();
            assert_eq!(output.dimmer, Some(if *lit { 1.0 } else { 0.0 }), "slot {}", index);
            glitch.update(Duration::from_millis(50));
        }
    }
}
