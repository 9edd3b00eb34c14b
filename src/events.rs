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
//! Fire-and-forget notifications for logging and telemetry.
//!
//! Subscribers receive events on bounded channels. Publishing never blocks: a
//! full subscriber misses the event and a disconnected one is dropped.
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::trace;

use crate::arbiter::types::{ChannelType, FinalLightingTarget};
use crate::effects::EffectKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    EffectTriggered {
        id: String,
        kind: EffectKind,
        intensity: f64,
        source: String,
        vibe: Option<String>,
        degraded: bool,
    },
    EffectFinished {
        id: String,
        kind: EffectKind,
        aborted: bool,
    },
    EffectBlocked {
        kind: EffectKind,
        reason: String,
    },
    OverrideSet {
        fixture_id: String,
        channels: Vec<ChannelType>,
        source: String,
    },
    OverrideReleased {
        fixture_id: String,
        channels: Vec<ChannelType>,
        expired: bool,
    },
    BlackoutToggled {
        active: bool,
    },
    Output(Arc<FinalLightingTarget>),
}

impl Event {
    /// True for events produced by the effect lifecycle.
    pub fn is_effect_event(&self) -> bool {
        matches!(
            self,
            Event::EffectTriggered { .. } | Event::EffectFinished { .. } | Event::EffectBlocked { .. }
        )
    }
}

/// Fans events out to any number of subscribers.
#[derive(Clone, Default)]
pub struct Notifier {
    subscribers: Arc<Mutex<Vec<Sender<Event>>>>,
}

impl Notifier {
    pub fn new() -> Notifier {
        Notifier::default()
    }

    /// Registers a subscriber with room for `capacity` undelivered events.
    pub fn subscribe(&self, capacity: usize) -> Receiver<Event> {
        let (sender, receiver) = bounded(capacity.max(1));
        self.subscribers.lock().push(sender);
        receiver
    }

    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.lock().is_empty()
    }

    pub fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| match subscriber.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("Subscriber full, dropping event");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
