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

use super::{
    mismatched, require_bpm, require_timeline, sane_bpm, EffectParams, MAX_EFFECT_DURATION,
};
use crate::color::Hsl;
use crate::effects::phase::{ramp_down, Phase, PhaseClock};
use crate::effects::{
    EffectConstraints, EffectError, EffectKind, EffectOutput, LightEffect, MovementOutput,
    TriggerContext,
};

/// 3-2 son clave on an eighth-note grid over two bars.
const CLAVE_HITS: [u32; 5] = [0, 3, 6, 10, 12];
const STEPS_PER_CYCLE: u32 = 16;
const DEFAULT_BPM: f64 = 120.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaveRhythmParams {
    /// Tempo override. Falls back to the trigger's BPM, then 120.
    pub bpm: Option<f64>,
    pub cycles: u32,
    pub hit_ms: u64,
    /// Relative pan swing per hit, alternating sides.
    pub swing: f64,
    pub color: Hsl,
}

impl Default for ClaveRhythmParams {
    fn default() -> Self {
        ClaveRhythmParams {
            bpm: None,
            cycles: 1,
            hit_ms: 120,
            swing: 0.25,
            color: Hsl::new(15.0, 0.9, 0.5),
        }
    }
}

/// Flashes and swings on the clave pattern, locked to tempo.
pub struct ClaveRhythm {
    params: ClaveRhythmParams,
    clock: PhaseClock,
    constraints: EffectConstraints,
    context: TriggerContext,
    step: Duration,
}

pub fn create(params: &EffectParams) -> Result<Box<dyn LightEffect>, EffectError> {
    let EffectParams::ClaveRhythm(params) = params else {
        return Err(mismatched(EffectKind::ClaveRhythm, params));
    };
    if let Some(bpm) = params.bpm {
        require_bpm(bpm)?;
    }
    if params.cycles == 0 || params.hit_ms == 0 {
        return Err(EffectError::InvalidParameter(
            "clave needs at least one cycle and a non-zero hit length".to_string(),
        ));
    }
    require_timeline("hit_ms", &[params.hit_ms])?;
    let length = clave_length(step_for(params.bpm.unwrap_or(DEFAULT_BPM)), params.cycles);
    if length > MAX_EFFECT_DURATION {
        return Err(EffectError::InvalidParameter(format!(
            "{} clave cycles run longer than {}s",
            params.cycles,
            MAX_EFFECT_DURATION.as_secs()
        )));
    }
    Ok(Box::new(ClaveRhythm::new(params.clone())))
}

fn step_for(bpm: f64) -> Duration {
    // Eighth notes.
    Duration::try_from_secs_f64(60.0 / bpm / 2.0)
        .unwrap_or_else(|_| Duration::from_secs_f64(60.0 / DEFAULT_BPM / 2.0))
}

fn clave_length(step: Duration, cycles: u32) -> Duration {
    step.saturating_mul(STEPS_PER_CYCLE).saturating_mul(cycles)
}

impl ClaveRhythm {
    pub fn new(params: ClaveRhythmParams) -> ClaveRhythm {
        let step = step_for(params.bpm.unwrap_or(DEFAULT_BPM));
        let clock = Self::clock_for(step, params.cycles);
        ClaveRhythm {
            params,
            clock,
            constraints: EffectConstraints::default(),
            context: TriggerContext::default(),
            step,
        }
    }

    fn clock_for(step: Duration, cycles: u32) -> PhaseClock {
        PhaseClock::new(vec![Phase::new("clave", clave_length(step, cycles))])
    }

    /// The most recent hit at or before now: its ordinal and time since it landed.
    fn last_hit(&self) -> Option<(u32, Duration)> {
        let elapsed = self.clock.elapsed();
        let cycle_length = self.step * STEPS_PER_CYCLE;
        let cycle = (elapsed.as_nanos() / cycle_length.as_nanos()) as u32;
        let into_cycle = elapsed - cycle_length * cycle;
        CLAVE_HITS
            .iter()
            .enumerate()
            .rev()
            .map(|(ordinal, step)| (ordinal as u32, self.step * *step))
            .find(|(_, at)| *at <= into_cycle)
            .map(|(ordinal, at)| (cycle * CLAVE_HITS.len() as u32 + ordinal, into_cycle - at))
    }
}

impl LightEffect for ClaveRhythm {
    fn kind(&self) -> EffectKind {
        EffectKind::ClaveRhythm
    }

    fn trigger(&mut self, context: &TriggerContext) {
        self.context = context.clone();
        let bpm = self
            .params
            .bpm
            .or(context.bpm.filter(|bpm| sane_bpm(*bpm)))
            .unwrap_or(DEFAULT_BPM);
        self.step = step_for(bpm);
        self.clock = Self::clock_for(self.step, self.params.cycles);
    }

    fn update(&mut self, delta: Duration) {
        self.clock.advance(delta);
    }

    fn output(&self) -> Option<EffectOutput> {
        self.clock.position()?;
        let (ordinal, since) = self.last_hit()?;
        let hit = Duration::from_millis(self.params.hit_ms);
        if since >= hit {
            return None;
        }
        let level = ramp_down(since.as_secs_f64() / hit.as_secs_f64())
            * self
                .context
                .intensity
                .clamp(0.0, 1.0)
                .min(self.constraints.max_intensity);
        let side = if ordinal % 2 == 0 { 1.0 } else { -1.0 };
        Some(EffectOutput {
            dimmer: Some(level),
            color: Some(self.params.color),
            movement: Some(MovementOutput::relative(side * self.params.swing, 0.0)),
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

    fn at(clave: &mut ClaveRhythm, ms: u64) -> Option<EffectOutput> {
        let target = Duration::from_millis(ms);
        let delta = target.saturating_sub(clave.clock.elapsed());
        clave.update(delta);
        clave.output()
    }

    #[test]
    fn hits_on_the_clave() {
        let mut clave = ClaveRhythm::new(ClaveRhythmParams::default());
        clave.trigger(&TriggerContext::default());
        // 120 BPM eighths are 250ms; hits at 0, 750, 1500, 2500 and 3000ms.
        assert_eq!(at(&mut clave, 0).unwrap().dimmer, Some(1.0));
        assert!(at(&mut clave, 300).is_none());
        assert!(at(&mut clave, 760).is_some());
        assert!(at(&mut clave, 2000).is_none());
        assert!(at(&mut clave, 2510).is_some());
    }

    #[test]
    fn unusable_context_tempo_is_ignored() {
        for bpm in [1e-300, f64::NAN, 5000.0] {
            let mut clave = ClaveRhythm::new(ClaveRhythmParams::default());
            clave.trigger(&TriggerContext {
                bpm: Some(bpm),
                ..Default::default()
            });
            assert_eq!(clave.expected_duration(), Duration::from_secs(4));
        }
    }

    #[test]
    fn swing_alternates() {
        let mut clave = ClaveRhythm::new(ClaveRhythmParams::default());
        clave.trigger(&TriggerContext::default());
        let first = at(&mut clave, 10).unwrap().movement.unwrap().pan;
        let second = at(&mut clave, 760).unwrap().movement.unwrap().pan;
        assert_eq!(first, 0.25);
        assert_eq!(second, -0.25);
    }

    #[test]
    fn follows_trigger_tempo() {
        let mut clave = ClaveRhythm::new(ClaveRhythmParams::default());
        clave.trigger(&TriggerContext {
            bpm: Some(60.0),
            ..Default::default()
        });
        assert_eq!(clave.expected_duration(), Duration::from_secs(8));
    }
}
