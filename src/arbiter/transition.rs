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
use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use super::types::ChannelType;

/// Maps linear progress in 0-1 onto eased progress in 0-1.
pub type Easing = fn(f64) -> f64;

pub fn linear(t: f64) -> f64 {
    t
}

pub fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// A crossfade on a single fixture channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: f64,
    pub to: f64,
    pub start: Instant,
    pub duration: Duration,
}

impl Transition {
    /// Linear progress at the given time, in 0-1.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    fn value(&self, now: Instant, easing: Easing) -> f64 {
        let eased = easing(self.progress(now));
        self.from + (self.to - self.from) * eased
    }
}

type TransitionKey = (String, ChannelType);

/// Tracks in-flight crossfades keyed by fixture and channel.
///
/// Transitions clean themselves up: the sample that reaches full progress
/// returns the target and removes the entry.
pub struct TransitionManager {
    transitions: HashMap<TransitionKey, Transition>,
    easing: Easing,
}

impl Default for TransitionManager {
    fn default() -> Self {
        TransitionManager::new()
    }
}

impl TransitionManager {
    pub fn new() -> TransitionManager {
        TransitionManager::with_easing(ease_in_out_cubic)
    }

    pub fn with_easing(easing: Easing) -> TransitionManager {
        TransitionManager {
            transitions: HashMap::new(),
            easing,
        }
    }

    /// Starts a transition. If one is already running for this key it is
    /// re-targeted from its current interpolated value, not from `from`.
    pub fn start(
        &mut self,
        fixture_id: &str,
        channel: ChannelType,
        from: f64,
        to: f64,
        duration: Duration,
        now: Instant,
    ) {
        let key = (fixture_id.to_string(), channel);
        let from = match self.transitions.get(&key) {
            Some(existing) => existing.value(now, self.easing),
            None => from,
        };
        debug!(
            fixture = fixture_id,
            channel = %channel,
            from,
            to,
            duration_ms = duration.as_millis() as u64,
            "Starting transition"
        );
        self.transitions.insert(
            key,
            Transition {
                from,
                to,
                start: now,
                duration,
            },
        );
    }

    /// Samples the transition for this key, re-targeting it to `current_target`.
    /// Returns `fallback` when nothing is in flight.
    pub fn sample(
        &mut self,
        fixture_id: &str,
        channel: ChannelType,
        current_target: f64,
        fallback: f64,
        now: Instant,
    ) -> f64 {
        let key = (fixture_id.to_string(), channel);
        let Some(transition) = self.transitions.get_mut(&key) else {
            return fallback;
        };

        transition.to = current_target;
        if transition.progress(now) >= 1.0 {
            self.transitions.remove(&key);
            return current_target;
        }
        transition.value(now, self.easing)
    }

    pub fn is_active(&self, fixture_id: &str, channel: ChannelType) -> bool {
        self.transitions
            .contains_key(&(fixture_id.to_string(), channel))
    }

    /// Linear progress of a single transition.
    pub fn progress(&self, fixture_id: &str, channel: ChannelType, now: Instant) -> Option<f64> {
        self.transitions
            .get(&(fixture_id.to_string(), channel))
            .map(|t| t.progress(now))
    }

    /// Mean progress across every in-flight transition on the fixture.
    pub fn fixture_progress(&self, fixture_id: &str, now: Instant) -> Option<f64> {
        let progress: Vec<f64> = self
            .transitions
            .iter()
            .filter(|((id, _), _)| id == fixture_id)
            .map(|(_, t)| t.progress(now))
            .collect();
        if progress.is_empty() {
            None
        } else {
            Some(progress.iter().sum::<f64>() / progress.len() as f64)
        }
    }

    pub fn cancel(&mut self, fixture_id: &str, channel: ChannelType) -> bool {
        self.transitions
            .remove(&(fixture_id.to_string(), channel))
            .is_some()
    }

    pub fn cancel_all(&mut self, fixture_id: &str) {
        self.transitions.retain(|(id, _), _| id != fixture_id);
    }

    /// Drops transitions for fixtures that fail the predicate.
    pub fn retain_fixtures(&mut self, keep: impl Fn(&str) -> bool) {
        self.transitions.retain(|(id, _), _| keep(id));
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
