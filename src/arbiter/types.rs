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
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// The five control layers, lowest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlLayer {
    Ai = 0,
    Consciousness = 1,
    Manual = 2,
    Effects = 3,
    Blackout = 4,
}

impl ControlLayer {
    pub const ALL: [ControlLayer; 5] = [
        ControlLayer::Ai,
        ControlLayer::Consciousness,
        ControlLayer::Manual,
        ControlLayer::Effects,
        ControlLayer::Blackout,
    ];

    /// Numeric priority; higher wins when layers are compared directly.
    pub fn priority(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ControlLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlLayer::Ai => "ai",
            ControlLayer::Consciousness => "consciousness",
            ControlLayer::Manual => "manual",
            ControlLayer::Effects => "effects",
            ControlLayer::Blackout => "blackout",
        };
        f.write_str(name)
    }
}

/// A logical fixture channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Dimmer,
    Red,
    Green,
    Blue,
    White,
    Amber,
    Pan,
    Tilt,
    Zoom,
    Focus,
}

impl ChannelType {
    pub const COUNT: usize = 10;

    pub const ALL: [ChannelType; ChannelType::COUNT] = [
        ChannelType::Dimmer,
        ChannelType::Red,
        ChannelType::Green,
        ChannelType::Blue,
        ChannelType::White,
        ChannelType::Amber,
        ChannelType::Pan,
        ChannelType::Tilt,
        ChannelType::Zoom,
        ChannelType::Focus,
    ];

    /// Position of this channel in per-fixture value arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The value this channel rests at when nothing drives it. Intensity and
    /// colour go dark; position and optics park at centre.
    pub fn safe_zero(self) -> f64 {
        match self {
            ChannelType::Pan | ChannelType::Tilt | ChannelType::Zoom | ChannelType::Focus => {
                128.0
            }
            _ => 0.0,
        }
    }

    /// Channels that carry light output and are zeroed by a dictatorial mix bus.
    pub fn is_intensity_or_color(self) -> bool {
        matches!(
            self,
            ChannelType::Dimmer
                | ChannelType::Red
                | ChannelType::Green
                | ChannelType::Blue
                | ChannelType::White
                | ChannelType::Amber
        )
    }

    pub fn is_position(self) -> bool {
        matches!(self, ChannelType::Pan | ChannelType::Tilt)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelType::Dimmer => "dimmer",
            ChannelType::Red => "red",
            ChannelType::Green => "green",
            ChannelType::Blue => "blue",
            ChannelType::White => "white",
            ChannelType::Amber => "amber",
            ChannelType::Pan => "pan",
            ChannelType::Tilt => "tilt",
            ChannelType::Zoom => "zoom",
            ChannelType::Focus => "focus",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelType::ALL
            .into_iter()
            .find(|channel| channel.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown channel type: {}", s))
    }
}

/// Capability flags for a fixture, stored as a bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct FixtureCapabilities(u32);

impl FixtureCapabilities {
    pub const NONE: FixtureCapabilities = FixtureCapabilities(0);
    pub const DIMMING: FixtureCapabilities = FixtureCapabilities(1 << 0);
    pub const COLOR: FixtureCapabilities = FixtureCapabilities(1 << 1);
    pub const WHITE: FixtureCapabilities = FixtureCapabilities(1 << 2);
    pub const AMBER: FixtureCapabilities = FixtureCapabilities(1 << 3);
    pub const MOVEMENT: FixtureCapabilities = FixtureCapabilities(1 << 4);
    pub const ZOOM: FixtureCapabilities = FixtureCapabilities(1 << 5);
    pub const FOCUS: FixtureCapabilities = FixtureCapabilities(1 << 6);

    #[inline]
    pub fn contains(&self, capability: FixtureCapabilities) -> bool {
        (self.0 & capability.0) != 0
    }

    #[inline]
    pub fn with(&self, capability: FixtureCapabilities) -> FixtureCapabilities {
        FixtureCapabilities(self.0 | capability.0)
    }

    /// Derives the capability set from a channel list.
    pub fn from_channels(channels: &[ChannelType]) -> FixtureCapabilities {
        channels
            .iter()
            .fold(FixtureCapabilities::NONE, |caps, channel| {
                caps.with(match channel {
                    ChannelType::Dimmer => FixtureCapabilities::DIMMING,
                    ChannelType::Red | ChannelType::Green | ChannelType::Blue => {
                        FixtureCapabilities::COLOR
                    }
                    ChannelType::White => FixtureCapabilities::WHITE,
                    ChannelType::Amber => FixtureCapabilities::AMBER,
                    ChannelType::Pan | ChannelType::Tilt => FixtureCapabilities::MOVEMENT,
                    ChannelType::Zoom => FixtureCapabilities::ZOOM,
                    ChannelType::Focus => FixtureCapabilities::FOCUS,
                })
            })
    }
}

/// An addressable lighting unit in the patch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fixture {
    pub id: String,
    pub zone: String,
    pub fixture_type: String,
    pub capabilities: FixtureCapabilities,
    pub channels: Vec<ChannelType>,
}

impl Fixture {
    pub fn new(id: &str, zone: &str, fixture_type: &str, channels: Vec<ChannelType>) -> Fixture {
        Fixture {
            id: id.to_string(),
            zone: zone.to_string(),
            fixture_type: fixture_type.to_string(),
            capabilities: FixtureCapabilities::from_channels(&channels),
            channels,
        }
    }

    pub fn has_channel(&self, channel: ChannelType) -> bool {
        self.channels.contains(&channel)
    }
}

/// How a manual override applies its values. Only absolute values are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideMode {
    #[default]
    Absolute,
}

/// A request to place manual control over some of a fixture's channels.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideRequest {
    pub fixture_id: String,
    pub values: BTreeMap<ChannelType, f64>,
    pub channels: BTreeSet<ChannelType>,
    pub mode: OverrideMode,
    pub source: String,
    pub priority: i32,
    /// Release automatically after this long. `None` or zero never expires.
    pub auto_release: Option<Duration>,
    /// Crossfade used when the override is released. Falls back to the
    /// arbiter's default crossfade.
    pub release_transition: Option<Duration>,
}

impl OverrideRequest {
    pub fn new(fixture_id: &str) -> OverrideRequest {
        OverrideRequest {
            fixture_id: fixture_id.to_string(),
            values: BTreeMap::new(),
            channels: BTreeSet::new(),
            mode: OverrideMode::Absolute,
            source: "manual".to_string(),
            priority: 0,
            auto_release: None,
            release_transition: None,
        }
    }

    /// Claims the channel and sets its value.
    pub fn set(mut self, channel: ChannelType, value: f64) -> Self {
        self.values.insert(channel, value);
        self.channels.insert(channel);
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn auto_release(mut self, after: Duration) -> Self {
        self.auto_release = Some(after);
        self
    }

    pub fn release_transition(mut self, duration: Duration) -> Self {
        self.release_transition = Some(duration);
        self
    }

    /// Checks the payload shape. Fixture existence is checked by the arbiter.
    pub fn validate(&self) -> Result<(), String> {
        if self.channels.is_empty() {
            return Err("override claims no channels".to_string());
        }
        for channel in &self.channels {
            match self.values.get(channel) {
                None => return Err(format!("claimed channel {} has no value", channel)),
                Some(value) if !value.is_finite() || !(0.0..=255.0).contains(value) => {
                    return Err(format!("value {} for {} is out of range", value, channel))
                }
                Some(_) => {}
            }
        }
        if let Some(channel) = self.values.keys().find(|c| !self.channels.contains(c)) {
            return Err(format!("value for {} is not claimed", channel));
        }
        Ok(())
    }
}

/// An accepted manual override, held by the arbiter until released.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualOverride {
    pub fixture_id: String,
    pub values: BTreeMap<ChannelType, f64>,
    pub channels: BTreeSet<ChannelType>,
    pub mode: OverrideMode,
    pub source: String,
    pub priority: i32,
    pub auto_release: Option<Duration>,
    pub release_transition: Option<Duration>,
    pub timestamp: Instant,
}

impl ManualOverride {
    pub(crate) fn from_request(request: OverrideRequest, timestamp: Instant) -> ManualOverride {
        ManualOverride {
            fixture_id: request.fixture_id,
            values: request.values,
            channels: request.channels,
            mode: request.mode,
            source: request.source,
            priority: request.priority,
            auto_release: request.auto_release,
            release_transition: request.release_transition,
            timestamp,
        }
    }

    /// Merges a newer request into this override. New values win, channel sets union.
    pub(crate) fn merge(&mut self, request: OverrideRequest, timestamp: Instant) {
        self.values.extend(request.values);
        self.channels.extend(request.channels);
        self.mode = request.mode;
        self.source = request.source;
        self.priority = request.priority;
        self.auto_release = request.auto_release;
        self.release_transition = request.release_transition;
        self.timestamp = timestamp;
    }

    pub fn claims(&self, channel: ChannelType) -> bool {
        self.channels.contains(&channel)
    }

    pub fn value(&self, channel: ChannelType) -> Option<f64> {
        if self.claims(channel) {
            self.values.get(&channel).copied()
        } else {
            None
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        match self.auto_release {
            Some(after) if !after.is_zero() => now.saturating_duration_since(self.timestamp) >= after,
            _ => false,
        }
    }
}

/// The merged state of one fixture for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureTarget {
    pub fixture_id: String,
    pub values: [u8; ChannelType::COUNT],
    pub winners: [ControlLayer; ChannelType::COUNT],
    pub crossfade_active: bool,
    pub crossfade_progress: f64,
}

impl FixtureTarget {
    /// A target with every channel at its safe-zero, credited to the given layer.
    pub fn safe_zero(fixture_id: &str, layer: ControlLayer) -> FixtureTarget {
        let mut values = [0; ChannelType::COUNT];
        for channel in ChannelType::ALL {
            values[channel.index()] = channel.safe_zero() as u8;
        }
        FixtureTarget {
            fixture_id: fixture_id.to_string(),
            values,
            winners: [layer; ChannelType::COUNT],
            crossfade_active: false,
            crossfade_progress: 0.0,
        }
    }

    pub fn value(&self, channel: ChannelType) -> u8 {
        self.values[channel.index()]
    }

    pub fn winner(&self, channel: ChannelType) -> ControlLayer {
        self.winners[channel.index()]
    }

    pub fn dimmer(&self) -> u8 {
        self.value(ChannelType::Dimmer)
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            self.value(ChannelType::Red),
            self.value(ChannelType::Green),
            self.value(ChannelType::Blue),
        )
    }

    pub fn pan_tilt(&self) -> (u8, u8) {
        (self.value(ChannelType::Pan), self.value(ChannelType::Tilt))
    }
}

/// What the active effects are doing globally this frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GlobalEffectsSummary {
    pub strobe_active: bool,
    pub strobe_rate: f64,
    pub blinder_active: bool,
    pub blinder_intensity: f64,
    pub blackout_active: bool,
    pub freeze_active: bool,
}

/// Which layers are contributing this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LayerActivity {
    pub ai: bool,
    pub consciousness: bool,
    pub manual_overrides: usize,
    pub effects: usize,
    pub blackout: bool,
}

/// The complete output of one arbitration pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalLightingTarget {
    pub frame: u64,
    pub fixtures: Vec<FixtureTarget>,
    pub global_effects: GlobalEffectsSummary,
    pub layers: LayerActivity,
    pub grand_master: f64,
    pub output_enabled: bool,
}

impl FinalLightingTarget {
    pub fn fixture(&self, id: &str) -> Option<&FixtureTarget> {
        self.fixtures.iter().find(|fixture| fixture.fixture_id == id)
    }

    /// The target that may reach hardware. When output is disarmed every fixture
    /// is replaced with its safe-zero state.
    pub fn gated(&self) -> FinalLightingTarget {
        if self.output_enabled {
            return self.clone();
        }
        FinalLightingTarget {
            fixtures: self
                .fixtures
                .iter()
                .map(|fixture| FixtureTarget::safe_zero(&fixture.fixture_id, ControlLayer::Blackout))
                .collect(),
            ..self.clone()
        }
    }
}

/// A point-in-time summary of the arbiter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbiterStatus {
    pub fixture_count: usize,
    pub frame_count: u64,
    pub layers: LayerActivity,
    pub grand_master: f64,
    pub blackout: bool,
    pub output_enabled: bool,
    pub active_effects: Vec<String>,
    pub transitions: usize,
    pub patterns: usize,
    pub formations: usize,
    pub vibe: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn channel_round_trips_through_name() {
        for channel in ChannelType::ALL {
            assert_eq!(channel.as_str().parse::<ChannelType>(), Ok(channel));
        }
        assert!("strobe".parse::<ChannelType>().is_err());
    }

    #[test]
    fn capabilities_follow_channels() {
        let caps = FixtureCapabilities::from_channels(&[
            ChannelType::Dimmer,
            ChannelType::Red,
            ChannelType::Pan,
        ]);
        assert!(caps.contains(FixtureCapabilities::DIMMING));
        assert!(caps.contains(FixtureCapabilities::COLOR));
        assert!(caps.contains(FixtureCapabilities::MOVEMENT));
        assert!(!caps.contains(FixtureCapabilities::ZOOM));
    }

    #[test]
    fn override_validation() {
        assert!(OverrideRequest::new("a").validate().is_err());
        assert!(OverrideRequest::new("a")
            .set(ChannelType::Dimmer, 255.0)
            .validate()
            .is_ok());
        assert!(OverrideRequest::new("a")
            .set(ChannelType::Dimmer, 256.0)
            .validate()
            .is_err());
        assert!(OverrideRequest::new("a")
            .set(ChannelType::Dimmer, f64::NAN)
            .validate()
            .is_err());

        let mut claim_only = OverrideRequest::new("a").set(ChannelType::Pan, 10.0);
        claim_only.channels.insert(ChannelType::Tilt);
        assert!(claim_only.validate().is_err());
    }

    #[test]
    fn override_merge_unions_channels() {
        let now = Instant::now();
        let mut existing = ManualOverride::from_request(
            OverrideRequest::new("a")
                .set(ChannelType::Dimmer, 10.0)
                .set(ChannelType::Pan, 20.0),
            now,
        );
        existing.merge(
            OverrideRequest::new("a")
                .set(ChannelType::Pan, 30.0)
                .set(ChannelType::Tilt, 40.0),
            now,
        );
        assert_eq!(existing.value(ChannelType::Dimmer), Some(10.0));
        assert_eq!(existing.value(ChannelType::Pan), Some(30.0));
        assert_eq!(existing.value(ChannelType::Tilt), Some(40.0));
        assert_eq!(existing.channels.len(), 3);
    }

    #[test]
    fn zero_auto_release_never_expires() {
        let now = Instant::now();
        let ovr = ManualOverride::from_request(
            OverrideRequest::new("a")
                .set(ChannelType::Dimmer, 10.0)
                .auto_release(Duration::ZERO),
            now,
        );
        assert!(!ovr.is_expired(now + Duration::from_secs(3600)));
    }

    #[test]
    fn gated_output_is_safe_zero_when_disarmed() {
        let mut target = FixtureTarget::safe_zero("a", ControlLayer::Ai);
        target.values[ChannelType::Dimmer.index()] = 255;
        let frame = FinalLightingTarget {
            frame: 1,
            fixtures: vec![target],
            global_effects: GlobalEffectsSummary::default(),
            layers: LayerActivity::default(),
            grand_master: 1.0,
            output_enabled: false,
        };
        let gated = frame.gated();
        assert_eq!(gated.fixtures[0].dimmer(), 0);
        assert_eq!(gated.fixtures[0].value(ChannelType::Pan), 128);
    }
}
