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
use tracing::debug;

use super::{mismatched, require_positive, require_timeline, EffectParams};
use crate::color::Hsl;
use crate::effects::phase::{ramp_down, ramp_up, Phase, PhaseClock};
use crate::effects::{
    EffectConstraints, EffectError, EffectKind, EffectOutput, LightEffect, TriggerContext,
};

/// Warm pulse colour used when strobing is not allowed.
const PULSE_COLOR: Hsl = Hsl {
    h: 30.0,
    s: 0.9,
    l: 0.5,
};
const PULSE_LEVEL: f64 = 0.7;
const PULSE_HZ: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrobeStormParams {
    pub rate_hz: f64,
    pub attack_ms: u64,
    pub sustain_ms: u64,
    pub decay_ms: u64,
    /// Strobe colour. White when unset.
    pub color: Option<Hsl>,
}

impl Default for StrobeStormParams {
    fn default() -> Self {
        StrobeStormParams {
            rate_hz: 8.0,
            attack_ms: 100,
            sustain_ms: 500,
            decay_ms: 200,
            color: None,
        }
    }
}

/// A strobe burst with an attack, sustain and decay envelope. Harsh music
/// speeds the strobe up. Under a zero-strobe constraint it falls back to slow
/// warm pulses.
pub struct StrobeStorm {
    params: StrobeStormParams,
    clock: PhaseClock,
    constraints: EffectConstraints,
    context: TriggerContext,
    rate: f64,
    pulse_mode: bool,
}

pub fn create(params: &EffectParams) -> Result<Box<dyn LightEffect>, EffectError> {
    let EffectParams::StrobeStorm(params) = params else {
        return Err(mismatched(EffectKind::StrobeStorm, params));
    };
    require_positive("rate_hz", params.rate_hz)?;
    require_timeline(
        "strobe phases",
        &[params.attack_ms, params.sustain_ms, params.decay_ms],
    )?;
    Ok(Box::new(StrobeStorm::new(params.clone())))
}

impl StrobeStorm {
    pub fn new(params: StrobeStormParams) -> StrobeStorm {
        let clock = PhaseClock::new(vec![
            Phase::millis("attack", params.attack_ms),
            Phase::millis("sustain", params.sustain_ms),
            Phase::millis("decay", params.decay_ms),
        ]);
        StrobeStorm {
            rate: params.rate_hz,
            params,
            clock,
            constraints: EffectConstraints::default(),
            context: TriggerContext::default(),
            pulse_mode: false,
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn is_pulse_mode(&self) -> bool {
        self.pulse_mode
    }
}

impl LightEffect for StrobeStorm {
    fn kind(&self) -> EffectKind {
        EffectKind::StrobeStorm
    }

    fn trigger(&mut self, context: &TriggerContext) {
        self.clock.reset();
        self.context = context.clone();

        let harshness = context.harshness.unwrap_or(0.0).clamp(0.0, 1.0);
        self.rate = self.params.rate_hz * (1.0 + harshness * 0.5);
        self.pulse_mode = false;
        if self.constraints.degraded {
            if self.constraints.max_strobe_rate <= 0.0 {
                self.pulse_mode = true;
            } else {
                self.rate = self.rate.min(self.constraints.max_strobe_rate);
            }
        }
        debug!(rate = self.rate, pulse = self.pulse_mode, "Strobe storm triggered");
    }

    fn update(&mut self, delta: Duration) {
        self.clock.advance(delta);
    }

    fn output(&self) -> Option<EffectOutput> {
        let position = self.clock.position()?;
        let envelope = match position.name {
            "attack" => ramp_up(position.progress),
            "decay" => ramp_down(position.progress),
            _ => 1.0,
        };
        let level = envelope
            * self
                .context
                .intensity
                .clamp(0.0, 1.0)
                .min(self.constraints.max_intensity);
        let t = self.clock.elapsed().as_secs_f64();

        if self.pulse_mode {
            let pulse = 0.5 - 0.5 * (TAU * PULSE_HZ * t).cos();
            return Some(EffectOutput {
                dimmer: Some(level * PULSE_LEVEL * pulse),
                color: Some(PULSE_COLOR),
                zones: self.context.zones.clone(),
                ..Default::default()
            });
        }

        let on = (t * self.rate).fract() < 0.5;
        let value = if on { level } else { 0.0 };
        Some(EffectOutput {
            dimmer: Some(value),
            white: self.params.color.is_none().then_some(value),
            color: self.params.color,
            strobe_rate: Some(self.rate),
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

    fn storm() -> StrobeStorm {
        StrobeStorm::new(StrobeStormParams::default())
    }

    #[test]
    fn envelope_follows_phases() {
        let mut effect = storm();
        effect.trigger(&TriggerContext::default());
        assert_eq!(effect.phase(), "attack");
        effect.update(Duration::from_millis(150));
        assert_eq!(effect.phase(), "sustain");
        effect.update(Duration::from_millis(500));
        assert_eq!(effect.phase(), "decay");
        effect.update(Duration::from_millis(200));
        assert!(effect.is_finished());
    }

    #[test]
    fn strobes_on_and_off() {
        let mut effect = storm();
        effect.trigger(&TriggerContext::default());
        // 8 Hz: on for the first 62.5ms of each 125ms cycle.
        effect.update(Duration::from_millis(250));
        let on = effect.output().unwrap();
        assert_eq!(on.dimmer, Some(1.0));
        assert_eq!(on.strobe_rate, Some(8.0));

        effect.update(Duration::from_millis(70));
        let off = effect.output().unwrap();
        assert_eq!(off.dimmer, Some(0.0));
    }

    #[test]
    fn harshness_raises_rate() {
        let mut effect = storm();
        effect.trigger(&TriggerContext {
            harshness: Some(1.0),
            ..Default::default()
        });
        assert_eq!(effect.rate(), 12.0);
    }

    #[test]
    fn degraded_rate_is_capped() {
        let mut effect = storm();
        effect.apply_constraints(&EffectConstraints {
            max_strobe_rate: 5.0,
            max_intensity: 0.4,
            degraded: true,
        });
        effect.trigger(&TriggerContext {
            harshness: Some(1.0),
            ..Default::default()
        });
        assert_eq!(effect.rate(), 5.0);
        effect.update(Duration::from_millis(200));
        let output = effect.output().unwrap();
        assert!(output.dimmer.unwrap() <= 0.4);
    }

    #[test]
    fn zero_strobe_falls_back_to_pulses() {
        let mut effect = storm();
        effect.apply_constraints(&EffectConstraints {
            max_strobe_rate: 0.0,
            max_intensity: 1.0,
            degraded: true,
        });
        effect.trigger(&TriggerContext::default());
        assert!(effect.is_pulse_mode());
        for ms in [50, 100, 100, 100, 100] {
            effect.update(Duration::from_millis(ms));
            let output = effect.output().unwrap();
            assert_eq!(output.strobe_rate, None);
            assert!(output.dimmer.unwrap() <= PULSE_LEVEL + 1e-9);
            assert_eq!(output.color, Some(PULSE_COLOR));
        }
    }
}
