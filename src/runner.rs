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
//! Drives a shared arbiter at its frame rate on a dedicated thread.
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use crate::arbiter::types::FinalLightingTarget;
use crate::providers::{
    FixturePatchProvider, IntentSource, MusicalContextProvider, OutputSink, PhysicsProvider,
};
use crate::shared::SharedArbiter;

/// Represents the current cancel state.
#[derive(PartialEq)]
enum CancelState {
    Untouched,
    Cancelled,
}

/// Tells a running loop to stop. The loop checks it once per tick.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<Mutex<CancelState>>,
    condvar: Arc<Condvar>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        CancelHandle::new()
    }
}

impl CancelHandle {
    pub fn new() -> CancelHandle {
        CancelHandle {
            cancelled: Arc::new(Mutex::new(CancelState::Untouched)),
            condvar: Arc::new(Condvar::new()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock() == CancelState::Cancelled
    }

    /// Blocks until cancelled.
    pub fn wait(&self) {
        let mut cancelled = self.cancelled.lock();
        self.condvar
            .wait_while(&mut cancelled, |state| *state == CancelState::Untouched);
    }

    /// Blocks until cancelled or the timeout passes. Returns true if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut cancelled = self.cancelled.lock();
        self.condvar.wait_while_for(
            &mut cancelled,
            |state| *state == CancelState::Untouched,
            timeout,
        );
        *cancelled == CancelState::Cancelled
    }

    pub fn cancel(&self) {
        let mut cancel_state = self.cancelled.lock();
        if *cancel_state == CancelState::Untouched {
            *cancel_state = CancelState::Cancelled;
            self.condvar.notify_all();
        }
    }
}

/// The tick loop: pulls the collaborators, arbitrates and hands the gated
/// frame to the output sink.
pub struct TickLoop {
    arbiter: SharedArbiter,
    sink: Box<dyn OutputSink>,
    context: Option<Box<dyn MusicalContextProvider>>,
    intent: Option<Box<dyn IntentSource>>,
    physics: Option<Box<dyn PhysicsProvider>>,
    patch: Option<Box<dyn FixturePatchProvider>>,
    period: Duration,
    cancel_handle: CancelHandle,
}

impl TickLoop {
    /// Creates a loop ticking at the arbiter's configured frame rate.
    pub fn new(arbiter: SharedArbiter, sink: Box<dyn OutputSink>) -> TickLoop {
        let period = arbiter.lock().config().frame_period();
        TickLoop {
            arbiter,
            sink,
            context: None,
            intent: None,
            physics: None,
            patch: None,
            period,
            cancel_handle: CancelHandle::new(),
        }
    }

    pub fn with_context(mut self, context: Box<dyn MusicalContextProvider>) -> TickLoop {
        self.context = Some(context);
        self
    }

    pub fn with_intent(mut self, intent: Box<dyn IntentSource>) -> TickLoop {
        self.intent = Some(intent);
        self
    }

    pub fn with_physics(mut self, physics: Box<dyn PhysicsProvider>) -> TickLoop {
        self.physics = Some(physics);
        self
    }

    pub fn with_patch(mut self, patch: Box<dyn FixturePatchProvider>) -> TickLoop {
        self.patch = Some(patch);
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Runs one tick at `now`. Returns the ungated target.
    pub fn tick(&mut self, now: Instant) -> FinalLightingTarget {
        let context = self
            .context
            .as_mut()
            .and_then(|provider| provider.context())
            .unwrap_or_default();
        let intent = self.intent.as_mut().map(|source| source.intent(&context));
        let positions = self.physics.as_mut().map(|physics| physics.positions());
        let patch = self.patch.as_mut().and_then(|patch| patch.poll_patch());

        let target = {
            let mut arbiter = self.arbiter.lock();
            if let Some(fixtures) = patch {
                arbiter.set_fixtures(fixtures);
            }
            if intent.is_some() || positions.is_some() {
                let mut intent = intent.unwrap_or_else(|| arbiter.ai_intent().clone());
                if let Some(positions) = positions {
                    intent.fixture_positions.extend(positions);
                }
                arbiter.set_ai_intent(intent);
            }
            arbiter.arbitrate_at(now)
        };

        if let Err(e) = self.sink.send(&target.gated()) {
            error!(err = e.to_string(), frame = target.frame, "Error sending frame to output");
        }
        target
    }

    /// Ticks until cancelled. Returns the number of frames produced.
    pub fn run(mut self) -> u64 {
        info!(period_ms = self.period.as_millis() as u64, "Tick loop started");
        let mut frames = 0;
        let mut last_time = Instant::now();
        loop {
            if self.cancel_handle.is_cancelled() {
                break;
            }
            self.tick(Instant::now());
            frames += 1;

            last_time += self.period;
            let now = Instant::now();
            if last_time > now {
                spin_sleep::sleep(last_time - now);
            } else {
                debug!(frame = frames, "Tick overran its period");
                last_time = now;
            }
        }
        info!(frames, "Tick loop stopped");
        frames
    }

    /// Runs the loop on its own thread.
    pub fn spawn(self) -> JoinHandle<u64> {
        thread::spawn(move || self.run())
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::error::Error;

    use super::*;
    use crate::arbiter::types::ChannelType;
    use crate::arbiter::Arbiter;
    use crate::config::ArbiterConfig;
    use crate::providers::{ColorWheelIntent, MetronomeContext, StaticPatch};
    use crate::testutil::{eventually, mover_fixture, rgb_fixture};

    #[derive(Clone, Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<FinalLightingTarget>>>,
    }

    impl OutputSink for Recorder {
        fn send(
            &mut self,
            target: &FinalLightingTarget,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.frames.lock().push(target.clone());
            Ok(())
        }
    }

    struct FixedPhysics(HashMap<String, (f64, f64)>);

    impl PhysicsProvider for FixedPhysics {
        fn positions(&mut self) -> HashMap<String, (f64, f64)> {
            self.0.clone()
        }
    }

    fn shared() -> (SharedArbiter, Instant) {
        let start = Instant::now();
        (
            SharedArbiter::new(Arbiter::starting_at(ArbiterConfig::default(), start)),
            start,
        )
    }

    #[test]
    fn cancel_handle_wakes_waiters() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || cancel_handle.wait())
        };

        cancel_handle.cancel();
        assert!(join.join().is_ok());
        assert!(cancel_handle.is_cancelled());
    }

    #[test]
    fn cancel_handle_times_out() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.wait_timeout(Duration::from_millis(10)));
        cancel_handle.cancel();
        assert!(cancel_handle.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn tick_pulls_collaborators() {
        let (arbiter, start) = shared();
        let recorder = Recorder::default();
        let mut physics = HashMap::new();
        physics.insert("m".to_string(), (10.0, 240.0));

        let mut tick_loop = TickLoop::new(arbiter.clone(), Box::new(recorder.clone()))
            .with_patch(Box::new(StaticPatch::new(vec![
                rgb_fixture("a", "front"),
                mover_fixture("m", "movers"),
            ])))
            .with_context(Box::new(MetronomeContext::new(120.0, Duration::from_millis(33))))
            .with_intent(Box::new(ColorWheelIntent::new(15.0)))
            .with_physics(Box::new(FixedPhysics(physics)));

        let target = tick_loop.tick(start);
        assert_eq!(target.fixtures.len(), 2);
        assert!(target.layers.ai);
        assert_eq!(target.fixture("m").unwrap().pan_tilt(), (10, 240));
        assert!(target.fixture("a").unwrap().dimmer() > 0);
        assert_eq!(arbiter.lock().fixtures().len(), 2);
        assert_eq!(recorder.frames.lock().len(), 1);
    }

    #[test]
    fn sink_receives_gated_frames() {
        let (arbiter, start) = shared();
        let recorder = Recorder::default();
        arbiter.with(|arbiter| {
            arbiter.set_fixtures(vec![rgb_fixture("a", "front")]);
            arbiter.set_output_enabled(false);
        });
        let mut tick_loop = TickLoop::new(arbiter, Box::new(recorder.clone()))
            .with_intent(Box::new(ColorWheelIntent::new(15.0)));

        let target = tick_loop.tick(start);
        assert!(target.fixture("a").unwrap().dimmer() > 0);
        let frames = recorder.frames.lock();
        assert_eq!(frames[0].fixture("a").unwrap().dimmer(), 0);
        assert_eq!(frames[0].fixture("a").unwrap().value(ChannelType::Red), 0);
    }

    #[test]
    fn hand_built_zero_rate_still_ticks() {
        let config = ArbiterConfig {
            frame_rate_hz: 0.0,
            ..Default::default()
        };
        let tick_loop = TickLoop::new(
            SharedArbiter::new(Arbiter::new(config)),
            Box::new(Recorder::default()),
        );
        assert_eq!(tick_loop.period(), ArbiterConfig::default().frame_period());
    }

    #[test]
    fn spawned_loop_runs_until_cancelled() {
        let _ = tracing_subscriber::fmt::try_init();
        let (arbiter, _) = shared();
        let recorder = Recorder::default();
        arbiter.with(|arbiter| arbiter.set_fixtures(vec![rgb_fixture("a", "front")]));

        let tick_loop = TickLoop::new(arbiter.clone(), Box::new(recorder.clone()));
        assert_eq!(tick_loop.period(), ArbiterConfig::default().frame_period());
        let cancel_handle = tick_loop.cancel_handle();
        let join = tick_loop.spawn();

        eventually(
            || recorder.frames.lock().len() >= 3,
            "Tick loop never produced frames",
        );
        cancel_handle.cancel();
        let frames = join.join().unwrap();
        assert!(frames >= 3);
        assert_eq!(arbiter.lock().frame_count(), frames);
    }
}
