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
use std::f64::consts::TAU;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{mismatched, require_timeline, EffectParams};
use crate::color::Hsl;
use crate::effects::phase::{ramp_down, ramp_up, Phase, PhaseClock};
use crate::effects::{
    EffectConstraints, EffectError, EffectKind, EffectOutput, LightEffect, TriggerContext,
};

const FADE_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostBreathParams {
    pub duration_ms: u64,
    pub period_ms: u64,
    pub floor: f64,
    pub peak: f64,
    pub color: Hsl,
}

impl Default for GhostBreathParams {
    fn default() -> Self {
        GhostBreathParams {
            duration_ms: 8000,
            period_ms: 4000,
            floor: 0.15,
            peak: 0.4,
            color: Hsl::new(210.0, 0.6, 0.35),
        }
    }
}

/// A slow, dim breathing glow for quiet passages.
pub struct GhostBreath {
    params: GhostBreathParams,
    clock: PhaseClock,
    constraints: EffectConstraints,
    context: TriggerContext,
}

pub fn create(params: &EffectParams) -> Result<Box<dyn LightEffect>, EffectError> {
    let EffectParams::GhostBreath(params) = params else {
        return Err(mismatched(EffectKind::GhostBreath, params));
    };
    require_timeline("duration_ms", &[params.duration_ms])?;
    require_timeline("period_ms", &[params.period_ms])?;
    if params.period_ms == 0 {
        return Err(EffectError::InvalidParameter(
            "period_ms must be non-zero".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&params.floor) || !(params.floor..=1.0).contains(&params.peak) {
        return Err(EffectError::InvalidParameter(format!(
            "breath levels must satisfy 0 <= floor <= peak <= 1, got {} and {}",
            params.floor, params.peak
        )));
    }
    Ok(Box::new(GhostBreath::new(params.clone())))
}

impl GhostBreath {
    pub fn new(params: GhostBreathParams) -> GhostBreath {
        let fade = FADE_MS.min(params.duration_ms / 2);
        let clock = PhaseClock::new(vec![
            Phase::millis("fade_in", fade),
            Phase::millis("breathe", params.duration_ms - 2 * fade),
            Phase::millis("fade_out", fade),
        ]);
        GhostBreath {
            params,
            clock,
            constraints: EffectConstraints::default(),
            context: TriggerContext::default(),
        }
    }
}

impl LightEffect for GhostBreath {
    fn kind(&self) -> EffectKind {
        EffectKind::GhostBreath
    }

    fn trigger(&mut self, context: &TriggerContext) {
        self.clock.reset();
        self.context = context.clone();
    }

    fn update(&mut self, delta: Duration) {
        self.clock.advance(delta);
    }

    fn output(&self) -> Option<EffectOutput> {
        let position = self.clock.position()?;
        let envelope = match position.name {
            "fade_in" => ramp_up(position.progress),
            "fade_out" => ramp_down(position.progress),
            _ => 1.0,
        };
        let t = self.clock.elapsed().as_secs_f64();
        let period = self.params.period_ms as f64 / 1000.0;
        let breath = 0.5 - 0.5 * (TAU * t / period).cos();
        let level = (self.params.floor + (self.params.peak - self.params.floor) * breath)
            * envelope
            * self.context.intensity.clamp(0.0, 1.0);
        Some(EffectOutput {
            dimmer: Some(level.min(self.constraints.max_intensity)),
            color: Some(self.params.color),
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

    #[test]
    fn stays_between_floor_and_peak() {
        let params = GhostBreathParams::default();
        let mut ghost = GhostBreath::new(params.clone());
        ghost.trigger(&TriggerContext::default());
        ghost.update(Duration::from_millis(1000));
        for _ in 0..50 {
            ghost.update(Duration::from_millis(100));
            if ghost.phase() != "breathe" {
                break;
            }
            let level = ghost.output().unwrap().dimmer.unwrap();
            assert!(level >= params.floor - 1e-9 && level <= params.peak + 1e-9);
        }
    }

    #[test]
    fn short_duration_shrinks_fades() {
        let ghost = GhostBreath::new(GhostBreathParams {
            duration_ms: 600,
            ..Default::default()
        });
        assert_eq!(ghost.expected_duration(), Duration::from_millis(600));
    }
}
