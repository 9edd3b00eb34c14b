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
//! The top-level mixer.
//!
//! Every tick the arbiter resolves one value per fixture channel from five
//! layers. Blackout short-circuits everything. A manual claim bypasses the
//! merge for its channel. Everything else goes through the channel's merge
//! strategy, then any in-flight release crossfade, then movement modifiers and
//! the grand master.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::{debug, info, trace, warn};

use crate::config::ArbiterConfig;
use crate::effects::manager::{CombinedOutput, EffectManager, EffectTrigger, TriggerOutcome};
use crate::effects::shield::VibeProvider;
use crate::effects::{EffectKind, EffectOutput, MixBus, MovementOutput, ZoneBlend, ZoneOutput};
use crate::events::{Event, Notifier};

use self::layers::{AiIntent, AiLayer, ConsciousnessLayer, ConsciousnessModifier};
use self::merge::{clamp_channel, merge_channel, Candidate, MergeStrategy};
use self::movement::{MovementModifiers, PatternConfig};
use self::transition::TransitionManager;
use self::types::{
    ArbiterStatus, ChannelType, ControlLayer, FinalLightingTarget, Fixture, FixtureTarget,
    LayerActivity, ManualOverride, OverrideRequest,
};

mod error;
pub mod layers;
pub mod merge;
pub mod movement;
pub mod transition;
pub mod types;

pub use error::ArbiterError;

/// Smallest change that counts as the consciousness layer touching a channel.
const CONSCIOUSNESS_EPSILON: f64 = 1e-6;

/// The base layer's offer for one channel.
#[derive(Debug, Clone, Copy)]
struct BaseValue {
    value: f64,
    layer: ControlLayer,
    timestamp: Instant,
}

/// A fixture's channels before manual claims count and before the grand
/// master, as held by a freeze.
#[derive(Debug, Clone)]
struct HeldChannels {
    values: [f64; ChannelType::COUNT],
    winners: [ControlLayer; ChannelType::COUNT],
}

/// Everything a fixture needs from the layers for one tick.
struct Frame<'a> {
    now: Instant,
    ai: &'a AiIntent,
    ai_at: Instant,
    modified: Option<(AiIntent, Instant)>,
    effects: Option<&'a CombinedOutput>,
}

impl<'a> Frame<'a> {
    fn new(
        now: Instant,
        ai: &'a AiLayer,
        consciousness: Option<&ConsciousnessLayer>,
        effects: Option<&'a CombinedOutput>,
    ) -> Frame<'a> {
        Frame {
            now,
            ai: &ai.intent,
            ai_at: ai.updated_at,
            modified: consciousness.map(|layer| (layer.modifier.apply(&ai.intent), layer.set_at)),
            effects,
        }
    }

    fn base(&self, fixture: &Fixture, channel: ChannelType) -> BaseValue {
        let ai = self.ai.channel_value(fixture, channel);
        if let Some((intent, set_at)) = &self.modified {
            let modified = intent.channel_value(fixture, channel);
            if (modified - ai).abs() > CONSCIOUSNESS_EPSILON {
                return BaseValue {
                    value: modified,
                    layer: ControlLayer::Consciousness,
                    timestamp: *set_at,
                };
            }
        }
        BaseValue {
            value: ai,
            layer: ControlLayer::Ai,
            timestamp: self.ai_at,
        }
    }

    /// True when a dictatorial composite reaches this fixture's zone.
    fn dictates(&self, fixture: &Fixture) -> bool {
        self.effects.is_some_and(|combined| {
            combined.mix_bus == MixBus::Dictatorial && reaches(&combined.output, &fixture.zone)
        })
    }

    /// The composite effect value for a channel in the DMX domain.
    fn effect_value(&self, fixture: &Fixture, channel: ChannelType, base: f64) -> Option<f64> {
        let output = &self.effects?.output;
        let global = if output.covers_zone(&fixture.zone) {
            effect_channel(
                output.dimmer,
                output.color.map(|c| c.to_rgb()),
                output.white,
                output.amber,
                output.movement,
                channel,
                base,
            )
        } else {
            None
        };

        let Some(zone) = output.zone_overrides.get(&fixture.zone) else {
            return global;
        };
        match (zone_channel(zone, channel, base), zone.blend) {
            (None, _) => global,
            (Some(value), ZoneBlend::Replace) => Some(value),
            (Some(value), ZoneBlend::Max) => match (global, MergeStrategy::for_channel(channel)) {
                (Some(global), MergeStrategy::Htp) => Some(global.max(value)),
                _ => Some(value),
            },
        }
    }
}

fn has_global(output: &EffectOutput) -> bool {
    output.dimmer.is_some()
        || output.color.is_some()
        || output.white.is_some()
        || output.amber.is_some()
        || output.movement.is_some()
}

fn reaches(output: &EffectOutput, zone: &str) -> bool {
    (has_global(output) && output.covers_zone(zone)) || output.zone_overrides.contains_key(zone)
}

fn zone_channel(zone: &ZoneOutput, channel: ChannelType, base: f64) -> Option<f64> {
    effect_channel(
        zone.dimmer,
        zone.color.map(|c| c.to_rgb()),
        zone.white,
        zone.amber,
        zone.movement,
        channel,
        base,
    )
}

/// Maps effect fields (0-1 intensities, -1 to 1 movement) onto a DMX channel.
fn effect_channel(
    dimmer: Option<f64>,
    rgb: Option<(f64, f64, f64)>,
    white: Option<f64>,
    amber: Option<f64>,
    movement: Option<MovementOutput>,
    channel: ChannelType,
    base: f64,
) -> Option<f64> {
    let position = |axis: f64, movement: MovementOutput| {
        if movement.absolute {
            (axis + 1.0) / 2.0 * 255.0
        } else {
            base + axis * 127.5
        }
    };
    match channel {
        ChannelType::Dimmer => dimmer.map(|d| d * 255.0),
        ChannelType::Red => rgb.map(|(r, _, _)| r),
        ChannelType::Green => rgb.map(|(_, g, _)| g),
        ChannelType::Blue => rgb.map(|(_, _, b)| b),
        ChannelType::White => white.map(|w| w * 255.0),
        ChannelType::Amber => amber.map(|a| a * 255.0),
        ChannelType::Pan => movement.map(|m| position(m.pan, m)),
        ChannelType::Tilt => movement.map(|m| position(m.tilt, m)),
        ChannelType::Zoom | ChannelType::Focus => None,
    }
}

/// Merges the control layers into a lighting target every tick.
///
/// Commands may be issued at any time between ticks. Their notifications are
/// queued and published on the next tick, after that tick's effect events.
pub struct Arbiter {
    config: ArbiterConfig,
    fixtures: Vec<Fixture>,
    ai: AiLayer,
    consciousness: Option<ConsciousnessLayer>,
    overrides: HashMap<String, ManualOverride>,
    effects: EffectManager,
    transitions: TransitionManager,
    movement: MovementModifiers,
    blackout: bool,
    grand_master: f64,
    output_enabled: bool,
    current_time: Instant,
    frame_count: u64,
    last_frame: HashMap<String, HeldChannels>,
    notifier: Notifier,
    pending: Vec<Event>,
}

impl Arbiter {
    pub fn new(config: ArbiterConfig) -> Arbiter {
        Arbiter::starting_at(config, Instant::now())
    }

    /// Creates an arbiter whose clock starts at `start`.
    pub fn starting_at(config: ArbiterConfig, start: Instant) -> Arbiter {
        Arbiter {
            effects: EffectManager::new(config.max_active_effects),
            config,
            fixtures: Vec::new(),
            ai: AiLayer::new(start),
            consciousness: None,
            overrides: HashMap::new(),
            transitions: TransitionManager::new(),
            movement: MovementModifiers::default(),
            blackout: false,
            grand_master: 1.0,
            output_enabled: true,
            current_time: start,
            frame_count: 0,
            last_frame: HashMap::new(),
            notifier: Notifier::new(),
            pending: Vec::new(),
        }
    }

    /// Replaces the transition manager, e.g. to change the easing curve.
    pub fn with_transitions(mut self, transitions: TransitionManager) -> Arbiter {
        self.transitions = transitions;
        self
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn current_time(&self) -> Instant {
        self.current_time
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    fn fixture(&self, id: &str) -> Option<&Fixture> {
        self.fixtures.iter().find(|fixture| fixture.id == id)
    }

    /// Replaces the fixture registry. State held for fixtures that are no longer
    /// patched is dropped.
    pub fn set_fixtures(&mut self, fixtures: Vec<Fixture>) {
        let keep = |id: &str| fixtures.iter().any(|fixture| fixture.id == id);
        self.overrides.retain(|id, _| keep(id.as_str()));
        self.transitions.retain_fixtures(keep);
        self.movement.retain_fixtures(keep);
        self.last_frame.retain(|id, _| keep(id.as_str()));
        info!(fixtures = fixtures.len(), "Fixture patch replaced");
        self.fixtures = fixtures;
    }

    pub fn set_ai_intent(&mut self, intent: AiIntent) {
        self.ai.intent = intent;
        self.ai.updated_at = self.current_time;
        self.ai.populated = true;
    }

    pub fn ai_intent(&self) -> &AiIntent {
        &self.ai.intent
    }

    /// Installs a consciousness modifier. It only takes effect when the layer is
    /// enabled in the config.
    pub fn set_consciousness(&mut self, modifier: ConsciousnessModifier) {
        if !self.config.consciousness_enabled {
            debug!("Consciousness layer disabled, modifier stored but inactive");
        }
        self.consciousness = Some(ConsciousnessLayer {
            modifier,
            set_at: self.current_time,
        });
    }

    pub fn clear_consciousness(&mut self) {
        self.consciousness = None;
    }

    fn live_consciousness(&self, now: Instant) -> Option<&ConsciousnessLayer> {
        if !self.config.consciousness_enabled {
            return None;
        }
        self.consciousness.as_ref().filter(|layer| layer.is_live(now))
    }

    fn frame(&self, now: Instant) -> Frame<'_> {
        Frame::new(now, &self.ai, self.live_consciousness(now), None)
    }

    /// Places manual control over some of a fixture's channels. Merges with
    /// any existing override on the fixture.
    pub fn set_manual_override(&mut self, request: OverrideRequest) -> Result<(), ArbiterError> {
        let result = self.apply_override(request);
        if let Err(e) = &result {
            warn!(err = %e, "Manual override rejected");
        }
        result
    }

    fn apply_override(&mut self, request: OverrideRequest) -> Result<(), ArbiterError> {
        let fixture = self
            .fixture(&request.fixture_id)
            .ok_or_else(|| ArbiterError::UnknownFixture(request.fixture_id.clone()))?;
        request.validate().map_err(ArbiterError::MalformedOverride)?;
        if let Some(channel) = request.channels.iter().find(|c| !fixture.has_channel(**c)) {
            return Err(ArbiterError::MalformedOverride(format!(
                "fixture {} has no {} channel",
                fixture.id, channel
            )));
        }
        let max = self.config.max_manual_overrides;
        if !self.overrides.contains_key(&request.fixture_id) && self.overrides.len() >= max {
            return Err(ArbiterError::OverrideCapacity { max });
        }

        let channels: Vec<ChannelType> = request.channels.iter().copied().collect();
        for channel in &channels {
            self.transitions.cancel(&request.fixture_id, *channel);
        }
        let fixture_id = request.fixture_id.clone();
        let source = request.source.clone();
        match self.overrides.get_mut(&fixture_id) {
            Some(existing) => existing.merge(request, self.current_time),
            None => {
                self.overrides.insert(
                    fixture_id.clone(),
                    ManualOverride::from_request(request, self.current_time),
                );
            }
        }

        info!(
            fixture = fixture_id.as_str(),
            channels = ?channels,
            source = source.as_str(),
            "Manual override set"
        );
        self.pending.push(Event::OverrideSet {
            fixture_id,
            channels,
            source,
        });
        Ok(())
    }

    pub fn manual_override(&self, fixture_id: &str) -> Option<&ManualOverride> {
        self.overrides.get(fixture_id)
    }

    /// Releases an override, fully or for the given channels. Each released
    /// channel crossfades from the override value back to the base layer.
    /// Returns the channels actually released.
    pub fn release_override(
        &mut self,
        fixture_id: &str,
        channels: Option<&[ChannelType]>,
    ) -> Result<Vec<ChannelType>, ArbiterError> {
        if self.fixture(fixture_id).is_none() && !self.overrides.contains_key(fixture_id) {
            return Err(ArbiterError::UnknownFixture(fixture_id.to_string()));
        }
        Ok(self.release_channels(fixture_id, channels, false))
    }

    /// Releases every override. Returns the number of fixtures released.
    pub fn release_all(&mut self) -> usize {
        let mut ids: Vec<String> = self.overrides.keys().cloned().collect();
        ids.sort();
        for id in &ids {
            self.release_channels(id, None, false);
        }
        ids.len()
    }

    fn release_channels(
        &mut self,
        fixture_id: &str,
        channels: Option<&[ChannelType]>,
        expired: bool,
    ) -> Vec<ChannelType> {
        let Some(existing) = self.overrides.get(fixture_id) else {
            return Vec::new();
        };
        let released: Vec<ChannelType> = existing
            .channels
            .iter()
            .copied()
            .filter(|channel| channels.map_or(true, |requested| requested.contains(channel)))
            .collect();
        if released.is_empty() {
            return released;
        }

        let duration = existing
            .release_transition
            .unwrap_or(self.config.default_crossfade);
        let now = self.current_time;
        let fades: Vec<(ChannelType, f64, f64)> = match self.fixture(fixture_id) {
            Some(fixture) => {
                let frame = self.frame(now);
                released
                    .iter()
                    .filter_map(|channel| {
                        let from = existing.value(*channel)?;
                        Some((*channel, from, frame.base(fixture, *channel).value))
                    })
                    .collect()
            }
            None => Vec::new(),
        };
        if !duration.is_zero() {
            for (channel, from, to) in fades {
                self.transitions
                    .start(fixture_id, channel, from, to, duration, now);
            }
        }

        if let Some(existing) = self.overrides.get_mut(fixture_id) {
            for channel in &released {
                existing.channels.remove(channel);
                existing.values.remove(channel);
            }
            if existing.channels.is_empty() {
                self.overrides.remove(fixture_id);
            }
        }

        info!(
            fixture = fixture_id,
            channels = ?released,
            expired,
            fade_ms = duration.as_millis() as u64,
            "Manual override released"
        );
        self.pending.push(Event::OverrideReleased {
            fixture_id: fixture_id.to_string(),
            channels: released.clone(),
            expired,
        });
        released
    }

    fn expire_overrides(&mut self, now: Instant) {
        let mut expired: Vec<String> = self
            .overrides
            .values()
            .filter(|o| o.is_expired(now))
            .map(|o| o.fixture_id.clone())
            .collect();
        expired.sort();
        for id in expired {
            self.release_channels(&id, None, true);
        }
    }

    /// Asks the effect manager to fire an effect at the current time.
    pub fn trigger_effect(&mut self, trigger: EffectTrigger) -> Result<TriggerOutcome, ArbiterError> {
        Ok(self.effects.trigger(trigger, self.current_time)?)
    }

    pub fn abort_effect(&mut self, id: &str) -> bool {
        self.effects.abort(id)
    }

    pub fn abort_effect_kind(&mut self, kind: EffectKind) -> usize {
        self.effects.abort_kind(kind)
    }

    pub fn abort_all_effects(&mut self) -> usize {
        self.effects.abort_all()
    }

    pub fn set_vibe_provider(&mut self, vibes: Arc<dyn VibeProvider>) {
        self.effects.set_vibe_provider(vibes);
    }

    pub fn effects(&self) -> &EffectManager {
        &self.effects
    }

    pub fn set_blackout(&mut self, active: bool) {
        if self.blackout == active {
            return;
        }
        self.blackout = active;
        info!(active, "Blackout toggled");
        self.pending.push(Event::BlackoutToggled { active });
    }

    pub fn toggle_blackout(&mut self) -> bool {
        self.set_blackout(!self.blackout);
        self.blackout
    }

    pub fn blackout(&self) -> bool {
        self.blackout
    }

    /// Sets the grand master, clamped to 0-1.
    pub fn set_grand_master(&mut self, level: f64) -> Result<(), ArbiterError> {
        if level.is_nan() {
            return Err(ArbiterError::InvalidCommand(
                "grand master must be a number".to_string(),
            ));
        }
        self.grand_master = level.clamp(0.0, 1.0);
        debug!(level = self.grand_master, "Grand master set");
        Ok(())
    }

    pub fn grand_master(&self) -> f64 {
        self.grand_master
    }

    fn check_fixtures(&self, ids: &[String]) -> Result<(), ArbiterError> {
        match ids.iter().find(|id| self.fixture(id).is_none()) {
            Some(id) => Err(ArbiterError::UnknownFixture(id.clone())),
            None => Ok(()),
        }
    }

    pub fn set_pattern(
        &mut self,
        fixture_ids: &[String],
        config: PatternConfig,
    ) -> Result<(), ArbiterError> {
        self.check_fixtures(fixture_ids)?;
        if !config.speed.is_finite() || !config.size.is_finite() {
            return Err(ArbiterError::InvalidCommand(
                "pattern speed and size must be finite".to_string(),
            ));
        }
        debug!(fixtures = ?fixture_ids, shape = %config.shape, "Pattern set");
        self.movement
            .set_pattern(fixture_ids, config, self.current_time);
        Ok(())
    }

    pub fn clear_pattern(&mut self, fixture_ids: &[String]) {
        self.movement.clear_pattern(fixture_ids);
    }

    /// Creates or moves a formation. Each member's offset from `center` is
    /// captured from its current position when it joins the formation.
    pub fn set_formation(
        &mut self,
        id: &str,
        members: &[String],
        center: (f64, f64),
        fan: f64,
    ) -> Result<(), ArbiterError> {
        self.check_fixtures(members)?;
        if !center.0.is_finite() || !center.1.is_finite() || !fan.is_finite() {
            return Err(ArbiterError::InvalidCommand(
                "formation centre and fan must be finite".to_string(),
            ));
        }

        let frame = self.frame(self.current_time);
        let positions: HashMap<String, (f64, f64)> = self
            .fixtures
            .iter()
            .filter(|fixture| members.contains(&fixture.id))
            .map(|fixture| {
                let manual = self.overrides.get(&fixture.id);
                let position = |channel: ChannelType| {
                    manual
                        .and_then(|o| o.value(channel))
                        .unwrap_or_else(|| frame.base(fixture, channel).value)
                };
                (
                    fixture.id.clone(),
                    (position(ChannelType::Pan), position(ChannelType::Tilt)),
                )
            })
            .collect();

        debug!(formation = id, members = members.len(), "Formation set");
        self.movement.set_formation(id, members, center, fan, |member| {
            positions
                .get(member)
                .copied()
                .unwrap_or((ChannelType::Pan.safe_zero(), ChannelType::Tilt.safe_zero()))
        });
        Ok(())
    }

    pub fn clear_formation(&mut self, id: &str) -> bool {
        self.movement.clear_formation(id)
    }

    pub fn set_output_enabled(&mut self, enabled: bool) {
        if self.output_enabled != enabled {
            info!(enabled, "Output gate changed");
        }
        self.output_enabled = enabled;
    }

    pub fn toggle_output_enabled(&mut self) -> bool {
        self.set_output_enabled(!self.output_enabled);
        self.output_enabled
    }

    pub fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    /// Subscribes to notifications with room for `capacity` undelivered events.
    pub fn subscribe(&self, capacity: usize) -> Receiver<Event> {
        self.notifier.subscribe(capacity)
    }

    fn layer_activity(&self, now: Instant) -> LayerActivity {
        LayerActivity {
            ai: self.ai.populated,
            consciousness: self.live_consciousness(now).is_some(),
            manual_overrides: self.overrides.len(),
            effects: self.effects.len(),
            blackout: self.blackout,
        }
    }

    pub fn status(&self) -> ArbiterStatus {
        ArbiterStatus {
            fixture_count: self.fixtures.len(),
            frame_count: self.frame_count,
            layers: self.layer_activity(self.current_time),
            grand_master: self.grand_master,
            blackout: self.blackout,
            output_enabled: self.output_enabled,
            active_effects: self
                .effects
                .active_effects()
                .into_iter()
                .map(|(id, kind, phase)| format!("{} {} ({})", id, kind, phase))
                .collect(),
            transitions: self.transitions.len(),
            patterns: self.movement.pattern_count(),
            formations: self.movement.formation_count(),
            vibe: self.effects.active_vibe_id(),
        }
    }

    /// Clears every layer, effect, transition and modifier. The patch, config,
    /// vibe provider and subscribers are kept.
    pub fn reset(&mut self) {
        self.ai = AiLayer::new(self.current_time);
        self.consciousness = None;
        self.overrides.clear();
        self.effects.clear();
        self.transitions.clear();
        self.movement.clear();
        self.blackout = false;
        self.grand_master = 1.0;
        self.output_enabled = true;
        self.frame_count = 0;
        self.last_frame.clear();
        self.pending.clear();
        info!("Arbiter reset");
    }

    /// Advances the clock by `delta` and arbitrates.
    pub fn arbitrate(&mut self, delta: Duration) -> FinalLightingTarget {
        self.arbitrate_at(self.current_time + delta)
    }

    /// Arbitrates one frame at `now`. Times before the current clock are
    /// treated as the current clock.
    pub fn arbitrate_at(&mut self, now: Instant) -> FinalLightingTarget {
        let now = now.max(self.current_time);
        self.current_time = now;

        self.expire_overrides(now);
        self.effects.update(now);
        let combined = self.effects.combined_output();
        let mut global_effects = self.effects.summary();
        global_effects.blackout_active = self.blackout;

        let frame = Frame::new(
            now,
            &self.ai,
            self.live_consciousness(now),
            combined.as_ref(),
        );

        let mut targets = Vec::with_capacity(self.fixtures.len());
        for fixture in &self.fixtures {
            if self.blackout {
                targets.push(FixtureTarget::safe_zero(&fixture.id, ControlLayer::Blackout));
                continue;
            }
            let held = if global_effects.freeze_active {
                self.last_frame.get(&fixture.id)
            } else {
                None
            };
            let frozen = held.is_some();
            let (target, channels) = resolve_fixture(
                &frame,
                fixture,
                self.overrides.get(&fixture.id),
                held,
                &mut self.transitions,
                &self.movement,
                self.grand_master,
            );
            if !frozen {
                self.last_frame.insert(fixture.id.clone(), channels);
            }
            targets.push(target);
        }

        self.frame_count += 1;
        let target = FinalLightingTarget {
            frame: self.frame_count,
            fixtures: targets,
            global_effects,
            layers: self.layer_activity(now),
            grand_master: self.grand_master,
            output_enabled: self.output_enabled,
        };
        trace!(frame = self.frame_count, fixtures = target.fixtures.len(), "Arbitrated");

        for event in self.effects.drain_events() {
            self.notifier.publish(event);
        }
        for event in self.pending.drain(..) {
            self.notifier.publish(event);
        }
        if self.notifier.has_subscribers() {
            self.notifier.publish(Event::Output(Arc::new(target.clone())));
        }
        target
    }
}

/// Resolves every channel of one fixture for one tick. With `held` set the
/// unclaimed channels repeat the held values instead of merging. Also returns
/// the channels as they stood before the grand master.
fn resolve_fixture(
    frame: &Frame<'_>,
    fixture: &Fixture,
    manual: Option<&ManualOverride>,
    held: Option<&HeldChannels>,
    transitions: &mut TransitionManager,
    movement: &MovementModifiers,
    grand_master: f64,
) -> (FixtureTarget, HeldChannels) {
    let mut target = FixtureTarget::safe_zero(&fixture.id, ControlLayer::Ai);
    // Read before sampling: a transition that completes this frame is removed by the sample.
    let progress = transitions.fixture_progress(&fixture.id, frame.now);
    let mut values = [0.0; ChannelType::COUNT];
    let mut claimed = [false; ChannelType::COUNT];
    for channel in ChannelType::ALL {
        values[channel.index()] = channel.safe_zero();
    }
    let dictated = frame.dictates(fixture);

    for &channel in &fixture.channels {
        let index = channel.index();
        if let Some(value) = manual.and_then(|o| o.value(channel)) {
            values[index] = value;
            claimed[index] = true;
            target.winners[index] = ControlLayer::Manual;
            continue;
        }
        if let Some(held) = held {
            values[index] = held.values[index];
            target.winners[index] = held.winners[index];
            continue;
        }

        let base = frame.base(fixture, channel);
        let zeroed = dictated && channel.is_intensity_or_color();
        let mut candidates = Vec::with_capacity(2);
        if !zeroed {
            candidates.push(Candidate::new(base.layer, base.value, base.timestamp));
        }
        match frame.effect_value(fixture, channel, base.value) {
            Some(value) => candidates.push(Candidate::new(ControlLayer::Effects, value, frame.now)),
            None if zeroed => candidates.push(Candidate::new(
                ControlLayer::Effects,
                channel.safe_zero(),
                frame.now,
            )),
            None => {}
        }
        let merged = merge_channel(channel, &candidates);
        values[index] = merged.value;
        target.winners[index] = merged.layer;

        if transitions.is_active(&fixture.id, channel) {
            values[index] = transitions.sample(&fixture.id, channel, base.value, merged.value, frame.now);
            target.winners[index] = base.layer;
            target.crossfade_active = true;
        }
    }

    let pan = ChannelType::Pan.index();
    let tilt = ChannelType::Tilt.index();
    let moves = fixture.has_channel(ChannelType::Pan) || fixture.has_channel(ChannelType::Tilt);
    if held.is_none() && moves {
        let (moved_pan, moved_tilt) =
            movement.apply(&fixture.id, (values[pan], values[tilt]), frame.now);
        if !claimed[pan] {
            values[pan] = moved_pan;
        }
        if !claimed[tilt] {
            values[tilt] = moved_tilt;
        }
    }

    let channels = HeldChannels {
        values,
        winners: target.winners,
    };

    let dimmer = ChannelType::Dimmer.index();
    values[dimmer] *= grand_master;

    for channel in ChannelType::ALL {
        target.values[channel.index()] = clamp_channel(channel, values[channel.index()]);
    }
    target.crossfade_progress = progress.unwrap_or(0.0);
    (target, channels)
}
