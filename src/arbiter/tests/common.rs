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
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::arbiter::layers::AiIntent;
use crate::arbiter::types::Fixture;
use crate::arbiter::Arbiter;
use crate::color::Hsl;
use crate::config::ArbiterConfig;
use crate::effects::shield::{StaticVibe, VibeProfile, VibeProvider};
use crate::events::Event;

pub(crate) use crate::testutil::{mover_fixture, rgb_fixture};

pub(crate) const RED: Hsl = Hsl {
    h: 0.0,
    s: 1.0,
    l: 0.5,
};

pub(crate) const BLUE: Hsl = Hsl {
    h: 240.0,
    s: 1.0,
    l: 0.5,
};

pub(crate) fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

pub(crate) fn arbiter_with(fixtures: Vec<Fixture>) -> (Arbiter, Instant) {
    arbiter_with_config(ArbiterConfig::default(), fixtures)
}

pub(crate) fn arbiter_with_config(
    config: ArbiterConfig,
    fixtures: Vec<Fixture>,
) -> (Arbiter, Instant) {
    let start = Instant::now();
    let mut arbiter = Arbiter::starting_at(config, start);
    arbiter.set_fixtures(fixtures);
    (arbiter, start)
}

/// A vibe that allows everything.
pub(crate) fn club() -> Arc<dyn VibeProvider> {
    Arc::new(StaticVibe(VibeProfile::unrestricted("club")))
}

pub(crate) fn intent(master_intensity: f64, primary: Hsl) -> AiIntent {
    AiIntent {
        master_intensity,
        primary,
        ..Default::default()
    }
}

/// An intent that parks one fixture at an absolute pan/tilt.
pub(crate) fn positioned(fixture_id: &str, pan: f64, tilt: f64) -> AiIntent {
    let mut intent = AiIntent::default();
    intent
        .fixture_positions
        .insert(fixture_id.to_string(), (pan, tilt));
    intent
}

/// Every non-output event received so far.
pub(crate) fn control_events(receiver: &Receiver<Event>) -> Vec<Event> {
    receiver
        .try_iter()
        .filter(|event| !matches!(event, Event::Output(_)))
        .collect()
}
