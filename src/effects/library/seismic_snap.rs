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
use crate::effects::phase::{ramp_down, Phase, PhaseClock};
use crate::effects::{
    EffectConstraints, EffectError, EffectKind, EffectOutput, LightEffect, MovementOutput,
    TriggerContext,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeismicSnapParams {
    pub blackout_ms: u64,
    pub snap_ms: u64,
    pub fade_ms: u64,
    /// Relative tilt kick during the snap, -1 to 1.
    pub tilt_kick: f64,
}

impl Default for SeismicSnapParams {
    fn default() -> Self {
        SeismicSnapParams {
            blackout_ms: 200,
            snap_ms: 200,
            fade_ms: 1100,
            tilt_kick: -0.3,
        }
    }
}

/// A drop hit: a short pre-blackout, a full-white snap with a tilt kick, then
/// a long fade. Runs on the dictatorial bus so the base never bleeds through.
pub struct SeismicSnap {
    params: SeismicSnapParams,
    clock: PhaseClock,
    constraints: EffectConstraints,
    context: TriggerContext,
}

pub fn create(params: &EffectParams) -> Result<Box<dyn LightEffect>, EffectError> {
    let EffectParams::SeismicSnap(params) = params else {
        return Err(mismatched(EffectKind::SeismicSnap, params));
    };
    require_timeline(
        "snap phases",
        &[params.blackout_ms, params.snap_ms, params.fade_ms],
    )?;
    if !(-1.0..=1.0).contains(&params.tilt_kick) {
        return Err(EffectError::InvalidParameter(format!(
            "tilt_kick must be within -1..1, got {}",
            params.tilt_kick
        )));
    }
    Ok(Box::new(SeismicSnap::new(params.clone())))
}

impl SeismicSnap {
    pub fn new(params: SeismicSnapParams) -> SeismicSnap {
        let clock = PhaseClock::new(vec![
            Phase::millis("blackout", params.blackout_ms),
            Phase::millis("snap", params.snap_ms),
            Phase::millis("fade", params.fade_ms),
        ]);
        SeismicSnap {
            params,
            clock,
            constraints: EffectConstraints::default(),
            context: TriggerContext::default(),
        }
    }
}

impl LightEffect for SeismicSnap {
    fn kind(&self) -> EffectKind {
        EffectKind::SeismicSnap
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
        let peak = self
            .context
            .intensity
            .clamp(0.0, 1.0)
            .min(self.constraints.max_intensity);
        let zones = self.context.zones.clone();
        let output = match position.name {
            "blackout" => EffectOutput {
                dimmer: Some(0.0),
                zones,
                ..Default::default()
            },
            "snap" => EffectOutput {
                dimmer: Some(peak),
                white: Some(peak),
                color: Some(Hsl::WHITE),
                movement: Some(MovementOutput::relative(0.0, self.params.tilt_kick)),
                zones,
                ..Default::default()
            },
            _ => {
                let level = peak * ramp_down(position.progress).powi(2);
                EffectOutput {
                    dimmer: Some(level),
                    white: Some(level),
                    color: Some(Hsl::WHITE),
                    zones,
                    ..Default::default()
                }
            }
        };
        Some(output)
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
    fn blackout_then_snap_then_fade() {
        let mut snap = SeismicSnap::new(SeismicSnapParams::default());
        snap.trigger(&TriggerContext::default());

        snap.update(Duration::from_millis(100));
        assert_eq!(snap.phase(), "blackout");
        let dark = snap.output().unwrap();
        assert_eq!(dark.dimmer, Some(0.0));
        assert!(dark.movement.is_none());

        snap.update(Duration::from_millis(200));
        assert_eq!(snap.phase(), "snap");
        let hit = snap.output().unwrap();
        assert_eq!(hit.dimmer, Some(1.0));
        assert_eq!(hit.movement.unwrap().tilt, -0.3);

        snap.update(Duration::from_millis(600));
        assert_eq!(snap.phase(), "fade");
        assert!(snap.output().unwrap().dimmer.unwrap() < 1.0);

        snap.update(Duration::from_millis(600));
        assert!(snap.is_finished());
    }

    #[test]
    fn rejects_out_of_range_kick() {
        let params = EffectParams::SeismicSnap(SeismicSnapParams {
            tilt_kick: 2.0,
            ..Default::default()
        });
        assert!(create(&params).is_err());
    }
}
