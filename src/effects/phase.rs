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
//! Shared timing core for phased effects.
use std::time::Duration;

use tracing::warn;

/// A named stretch of an effect's timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Phase {
    pub name: &'static str,
    pub duration: Duration,
}

impl Phase {
    pub const fn new(name: &'static str, duration: Duration) -> Phase {
        Phase { name, duration }
    }

    pub const fn millis(name: &'static str, ms: u64) -> Phase {
        Phase::new(name, Duration::from_millis(ms))
    }
}

/// Where the clock is within its phases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhasePosition {
    pub name: &'static str,
    pub index: usize,
    /// Linear progress through the current phase, 0-1.
    pub progress: f64,
    /// Time spent in the current phase.
    pub elapsed: Duration,
}

/// Runs an effect through consecutive phases driven by elapsed time alone.
///
/// A timed clock finishes once the summed phase durations have elapsed. An
/// open-ended clock holds its final phase until the effect calls `finish`;
/// if that never happens it is forced to finish at 1.5x the expected length
/// and flagged.
#[derive(Debug, Clone)]
pub struct PhaseClock {
    phases: Vec<Phase>,
    total: Duration,
    elapsed: Duration,
    open_ended: bool,
    finished: bool,
    hit_safety_cap: bool,
}

impl PhaseClock {
    pub fn new(phases: Vec<Phase>) -> PhaseClock {
        let total = phases
            .iter()
            .fold(Duration::ZERO, |total, p| total.saturating_add(p.duration));
        PhaseClock {
            phases,
            total,
            elapsed: Duration::ZERO,
            open_ended: false,
            finished: false,
            hit_safety_cap: false,
        }
    }

    /// A clock whose final phase holds until `finish` is called.
    pub fn open_ended(phases: Vec<Phase>) -> PhaseClock {
        PhaseClock {
            open_ended: true,
            ..PhaseClock::new(phases)
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.finished = false;
        self.hit_safety_cap = false;
    }

    pub fn advance(&mut self, delta: Duration) {
        if self.finished {
            return;
        }
        self.elapsed = self.elapsed.saturating_add(delta);
        if !self.open_ended && self.elapsed >= self.total {
            self.finished = true;
        }
        if !self.finished && self.elapsed.as_secs_f64() > self.total.as_secs_f64() * 1.5 {
            warn!(
                elapsed_ms = self.elapsed.as_millis() as u64,
                "Effect ran past its safety cap"
            );
            self.hit_safety_cap = true;
            self.finished = true;
        }
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn hit_safety_cap(&self) -> bool {
        self.hit_safety_cap
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// Overall linear progress, 0-1.
    pub fn progress(&self) -> f64 {
        if self.total.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.total.as_secs_f64()).min(1.0)
    }

    /// The current phase, or `None` once finished.
    pub fn position(&self) -> Option<PhasePosition> {
        if self.finished {
            return None;
        }
        let mut start = Duration::ZERO;
        for (index, phase) in self.phases.iter().enumerate() {
            let end = start.saturating_add(phase.duration);
            if self.elapsed < end {
                let into = self.elapsed - start;
                let progress = if phase.duration.is_zero() {
                    1.0
                } else {
                    into.as_secs_f64() / phase.duration.as_secs_f64()
                };
                return Some(PhasePosition {
                    name: phase.name,
                    index,
                    progress,
                    elapsed: into,
                });
            }
            start = end;
        }
        if self.open_ended {
            let index = self.phases.len().checked_sub(1)?;
            return Some(PhasePosition {
                name: self.phases[index].name,
                index,
                progress: 1.0,
                elapsed: self
                    .elapsed
                    .saturating_sub(self.total.saturating_sub(self.phases[index].duration)),
            });
        }
        None
    }

    /// Name of the current phase, `"finished"` once done.
    pub fn phase_name(&self) -> &'static str {
        self.position().map(|p| p.name).unwrap_or("finished")
    }
}

/// Linear ramp helpers for envelopes.
pub fn ramp_up(progress: f64) -> f64 {
    progress.clamp(0.0, 1.0)
}

pub fn ramp_down(progress: f64) -> f64 {
    1.0 - progress.clamp(0.0, 1.0)
}
