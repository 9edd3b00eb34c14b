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

use serde::{Deserialize, Serialize};

use super::{mismatched, require_timeline, EffectParams};
use crate::color::Hsl;
use crate::effects::phase::{ramp_down, ramp_up, Phase, PhaseClock};
use crate::effects::{
    EffectConstraints, EffectError, EffectKind, EffectOutput, LightEffect, TriggerContext,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolarFlareParams {
    pub flash_ms: u64,
    pub hold_ms: u64,
    pub fade_ms: u64,
    /// Tint for colour fixtures. Pure white when unset.
    pub tint: Option<Hsl>,
}

impl Default for SolarFlareParams {
    fn default() -> Self {
        SolarFlareParams {
            flash_ms: 80,
            hold_ms: 300,
            fade_ms: 700,
            tint: None,
        }
    }
}

/// A blinder hit: a fast flash to full white, a short hold, then a long fade.
pub struct SolarFlare {
    params: SolarFlareParams,
    clock: PhaseClock,
    constraints: EffectConstraints,
    context: TriggerContext,
}

pub fn create(params: &EffectParams) -> Result<Box<dyn LightEffect>, EffectError> {
    let EffectParams::SolarFlare(params) = params else {
        return Err(mismatched(EffectKind::SolarFlare, params));
    };
    require_timeline("flare phases", &[params.flash_ms, params.hold_ms, params.fade_ms])?;
    if params.flash_ms + params.hold_ms + params.fade_ms == 0 {
        return Err(EffectError::InvalidParameter(
            "solar flare needs a non-zero duration".to_string(),
        ));
    }
    Ok(Box::new(SolarFlare::new(params.clone())))
}

impl SolarFlare {
    pub fn new(params: SolarFlareParams) -> SolarFlare {
        let clock = PhaseClock::new(vec![
            Phase::millis("flash", params.flash_ms),
            Phase::millis("hold", params.hold_ms),
            Phase::millis("fade", params.fade_ms),
        ]);
        SolarFlare {
            params,
            clock,
            constraints: EffectConstraints::default(),
            context: TriggerContext::default(),
        }
    }
}

impl LightEffect for SolarFlare {
    fn kind(&self) -> EffectKind {
        EffectKind::SolarFlare
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
            "flash" => ramp_up(position.progress),
            "hold" => 1.0,
            // Squared so the tail lingers like a real lamp cooling.
            _ => ramp_down(position.progress).powi(2),
        };
        let level = envelope
            * self
                .context
                .intensity
                .clamp(0.0, 1.0)
                .min(self.constraints.max_intensity);
        Some(EffectOutput {
            dimmer: Some(level),
            white: Some(level),
            color: Some(self.params.tint.unwrap_or(Hsl::WHITE)),
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
