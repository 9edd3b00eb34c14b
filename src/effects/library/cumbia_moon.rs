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
    EffectConstraints, EffectError, EffectKind, EffectOutput, LightEffect, MovementOutput,
    TriggerContext,
};

/// Seconds per drift cycle.
const DRIFT_PERIOD: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CumbiaMoonParams {
    pub rise_ms: u64,
    pub glow_ms: u64,
    pub set_ms: u64,
    pub amber: f64,
    /// Relative pan sway, -1 to 1.
    pub drift: f64,
}

impl Default for CumbiaMoonParams {
    fn default() -> Self {
        CumbiaMoonParams {
            rise_ms: 2000,
            glow_ms: 6000,
            set_ms: 2000,
            amber: 0.6,
            drift: 0.15,
        }
    }
}

/// A warm amber moonrise with a lazy side-to-side sway.
pub struct CumbiaMoon {
    params: CumbiaMoonParams,
    clock: PhaseClock,
    constraints: EffectConstraints,
    context: TriggerContext,
}

pub fn create(params: &EffectParams) -> Result<Box<dyn LightEffect>, EffectError> {
    let EffectParams::CumbiaMoon(params) = params else {
        return Err(mismatched(EffectKind::CumbiaMoon, params));
    };
    require_timeline("moon phases", &[params.rise_ms, params.glow_ms, params.set_ms])?;
    if !(0.0..=1.0).contains(&params.amber) || !(-1.0..=1.0).contains(&params.drift) {
        return Err(EffectError::InvalidParameter(
            "amber must be 0-1 and drift -1 to 1".to_string(),
        ));
    }
    Ok(Box::new(CumbiaMoon::new(params.clone())))
}

impl CumbiaMoon {
    pub fn new(params: CumbiaMoonParams) -> CumbiaMoon {
        let clock = PhaseClock::new(vec![
            Phase::millis("rise", params.rise_ms),
            Phase::millis("glow", params.glow_ms),
            Phase::millis("set", params.set_ms),
        ]);
        CumbiaMoon {
            params,
            clock,
            constraints: EffectConstraints::default(),
            context: TriggerContext::default(),
        }
    }
}

impl LightEffect for CumbiaMoon {
    fn kind(&self) -> EffectKind {
        EffectKind::CumbiaMoon
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
            "rise" => ramp_up(position.progress),
            "set" => ramp_down(position.progress),
            _ => 1.0,
        };
        let level = envelope
            * self
                .context
                .intensity
                .clamp(0.0, 1.0)
                .min(self.constraints.max_intensity);
        let t = self.clock.elapsed().as_secs_f64();
        Some(EffectOutput {
            dimmer: Some(0.5 * level),
            amber: Some(self.params.amber * level),
            color: Some(Hsl::new(35.0, 0.85, 0.45)),
            movement: Some(MovementOutput::relative(
                self.params.drift * (TAU * t / DRIFT_PERIOD).sin(),
                0.0,
            )),
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
