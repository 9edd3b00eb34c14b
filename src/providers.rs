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
//! Collaborator contracts: what the arbiter pulls in each tick and where its
//! output goes.
use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::arbiter::layers::AiIntent;
use crate::arbiter::types::{Fixture, FinalLightingTarget};
use crate::color::Hsl;

/// The musical analysis for one tick. The default is silence.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MusicalContext {
    pub bpm: f64,
    /// Normalized energy, 0-1.
    pub energy: f64,
    pub key: Option<String>,
    pub mode: Option<String>,
    pub section: Option<String>,
    /// Position in the analysed stream.
    pub timestamp: Duration,
}

pub trait MusicalContextProvider: Send {
    /// The latest context, or `None` before any analysis has arrived.
    fn context(&mut self) -> Option<MusicalContext>;
}

/// Supplies the full patch whenever it changes.
pub trait FixturePatchProvider: Send {
    /// The new patch if it changed since the last call.
    fn poll_patch(&mut self) -> Option<Vec<Fixture>>;
}

/// Supplies absolute pan/tilt targets per fixture.
pub trait PhysicsProvider: Send {
    fn positions(&mut self) -> HashMap<String, (f64, f64)>;
}

/// Turns musical context into the AI layer's intent.
pub trait IntentSource: Send {
    fn intent(&mut self, context: &MusicalContext) -> AiIntent;
}

/// Receives each frame. The arbiter has already applied the output gate.
pub trait OutputSink: Send {
    fn send(&mut self, target: &FinalLightingTarget) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Hands out a patch once.
pub struct StaticPatch(Option<Vec<Fixture>>);

impl StaticPatch {
    pub fn new(fixtures: Vec<Fixture>) -> StaticPatch {
        StaticPatch(Some(fixtures))
    }
}

impl FixturePatchProvider for StaticPatch {
    fn poll_patch(&mut self) -> Option<Vec<Fixture>> {
        self.0.take()
    }
}

/// A steady synthetic beat, for running without an analysis front end.
pub struct MetronomeContext {
    bpm: f64,
    period: Duration,
    elapsed: Duration,
}

impl MetronomeContext {
    pub fn new(bpm: f64, period: Duration) -> MetronomeContext {
        MetronomeContext {
            bpm,
            period,
            elapsed: Duration::ZERO,
        }
    }
}

impl MusicalContextProvider for MetronomeContext {
    fn context(&mut self) -> Option<MusicalContext> {
        self.elapsed += self.period;
        let beat = self.elapsed.as_secs_f64() * self.bpm / 60.0;
        // Energy swells over each 16-beat phrase.
        let energy = 0.5 - 0.5 * (beat / 16.0 * std::f64::consts::TAU).cos();
        Some(MusicalContext {
            bpm: self.bpm,
            energy,
            timestamp: self.elapsed,
            ..Default::default()
        })
    }
}

/// Rotates hue with time and follows energy with intensity.
pub struct ColorWheelIntent {
    degrees_per_beat: f64,
}

impl ColorWheelIntent {
    pub fn new(degrees_per_beat: f64) -> ColorWheelIntent {
        ColorWheelIntent { degrees_per_beat }
    }
}

impl IntentSource for ColorWheelIntent {
    fn intent(&mut self, context: &MusicalContext) -> AiIntent {
        let beats = context.timestamp.as_secs_f64() * context.bpm / 60.0;
        AiIntent {
            master_intensity: 0.2 + 0.8 * context.energy.clamp(0.0, 1.0),
            primary: Hsl::new((beats * self.degrees_per_beat).rem_euclid(360.0), 1.0, 0.5),
            context: context.clone(),
            ..Default::default()
        }
    }
}

/// Logs frames instead of driving hardware.
pub struct LogSink {
    every: u64,
}

impl LogSink {
    /// Logs a summary line every `every` frames and per-fixture detail at debug.
    pub fn new(every: u64) -> LogSink {
        LogSink {
            every: every.max(1),
        }
    }
}

impl OutputSink for LogSink {
    fn send(&mut self, target: &FinalLightingTarget) -> Result<(), Box<dyn Error + Send + Sync>> {
        for fixture in &target.fixtures {
            debug!(
                frame = target.frame,
                fixture = fixture.fixture_id.as_str(),
                dimmer = fixture.dimmer(),
                rgb = ?fixture.rgb(),
                pan_tilt = ?fixture.pan_tilt(),
                "Fixture target"
            );
        }
        if target.frame % self.every == 0 {
            info!(
                frame = target.frame,
                fixtures = target.fixtures.len(),
                effects = target.layers.effects,
                overrides = target.layers.manual_overrides,
                strobe = target.global_effects.strobe_active,
                blackout = target.global_effects.blackout_active,
                armed = target.output_enabled,
                "Frame"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn static_patch_is_delivered_once() {
        let mut patch = StaticPatch::new(vec![]);
        assert!(patch.poll_patch().is_some());
        assert!(patch.poll_patch().is_none());
    }

    #[test]
    fn color_wheel_tracks_energy() {
        let mut source = ColorWheelIntent::new(10.0);
        let quiet = source.intent(&MusicalContext::default());
        let loud = source.intent(&MusicalContext {
            energy: 1.0,
            ..Default::default()
        });
        assert!((quiet.master_intensity - 0.2).abs() < 1e-12);
        assert!((loud.master_intensity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn metronome_advances() {
        let mut metronome = MetronomeContext::new(120.0, Duration::from_millis(500));
        let first = metronome.context().unwrap();
        let second = metronome.context().unwrap();
        assert!(second.timestamp > first.timestamp);
        assert_eq!(first.bpm, 120.0);
    }
}
