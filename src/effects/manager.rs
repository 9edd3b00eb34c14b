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
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::catalog::{EffectCategory, EffectTraits};
use super::library::{sane_bpm, EffectParams, EffectRegistry};
use super::shield::{self, NoVibe, ShieldDecision, VibeProfile, VibeProvider};
use super::traffic::{self, RunningEffect, TrafficDecision};
use super::{EffectError, EffectKind, EffectOutput, LightEffect, MixBus, TriggerContext};
use crate::arbiter::types::GlobalEffectsSummary;
use crate::events::Event;

/// A request to fire an effect.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectTrigger {
    pub params: EffectParams,
    /// Requested intensity, 0-1.
    pub intensity: f64,
    pub zones: Vec<String>,
    pub source: String,
    /// Abort the effect if it is still running after this long.
    pub max_duration: Option<Duration>,
    pub bpm: Option<f64>,
    pub harshness: Option<f64>,
    /// Seed for pseudo-random effects. Derived from the trigger sequence when unset.
    pub seed: Option<u64>,
}

impl EffectTrigger {
    pub fn new(kind: EffectKind) -> EffectTrigger {
        EffectTrigger::with_params(EffectParams::defaults(kind))
    }

    pub fn with_params(params: EffectParams) -> EffectTrigger {
        EffectTrigger {
            params,
            intensity: 1.0,
            zones: Vec::new(),
            source: "manual".to_string(),
            max_duration: None,
            bpm: None,
            harshness: None,
            seed: None,
        }
    }

    pub fn kind(&self) -> EffectKind {
        self.params.kind()
    }

    pub fn intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn zones(mut self, zones: &[&str]) -> Self {
        self.zones = zones.iter().map(|z| z.to_string()).collect();
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    pub fn bpm(mut self, bpm: f64) -> Self {
        self.bpm = Some(bpm);
        self
    }

    pub fn harshness(mut self, harshness: f64) -> Self {
        self.harshness = Some(harshness);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// The synchronous result of a trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Fired { id: String, degraded: bool },
    Blocked { reason: String },
}

impl TriggerOutcome {
    pub fn id(&self) -> Option<&str> {
        match self {
            TriggerOutcome::Fired { id, .. } => Some(id),
            TriggerOutcome::Blocked { .. } => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, TriggerOutcome::Blocked { .. })
    }
}

/// The composite of every active effect for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedOutput {
    pub output: EffectOutput,
    pub mix_bus: MixBus,
    pub active: usize,
}

struct ActiveEffect {
    id: String,
    kind: EffectKind,
    traits: EffectTraits,
    instance: Box<dyn LightEffect>,
    started: Instant,
    last_update: Instant,
    max_duration: Option<Duration>,
    aborted: bool,
}

impl ActiveEffect {
    fn is_live(&self) -> bool {
        !self.instance.is_finished()
    }

    fn abort(&mut self) {
        self.instance.abort();
        self.aborted = true;
    }
}

#[derive(Default)]
struct ZonePriorities {
    color: Option<u8>,
    movement: Option<u8>,
    blend: Option<u8>,
}

fn max_option(current: Option<f64>, candidate: Option<f64>) -> Option<f64> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn outranks(priority: u8, current: Option<u8>) -> bool {
    current.map_or(true, |current| priority > current)
}

/// Owns the active effects: admits new ones, advances them each frame and
/// composites their outputs.
pub struct EffectManager {
    registry: EffectRegistry,
    vibes: Arc<dyn VibeProvider>,
    active: Vec<ActiveEffect>,
    max_active: usize,
    next_id: u64,
    events: Vec<Event>,
}

impl EffectManager {
    pub fn new(max_active: usize) -> EffectManager {
        EffectManager::with_registry(EffectRegistry::builtin(), max_active)
    }

    pub fn with_registry(registry: EffectRegistry, max_active: usize) -> EffectManager {
        EffectManager {
            registry,
            vibes: Arc::new(NoVibe),
            active: Vec::new(),
            max_active,
            next_id: 1,
            events: Vec::new(),
        }
    }

    pub fn set_vibe_provider(&mut self, vibes: Arc<dyn VibeProvider>) {
        self.vibes = vibes;
    }

    pub fn set_max_active(&mut self, max_active: usize) {
        self.max_active = max_active;
    }

    /// The active vibe, or the restrictive profile when none is available.
    pub fn vibe(&self) -> VibeProfile {
        self.vibes
            .active_vibe()
            .unwrap_or_else(VibeProfile::restrictive)
    }

    /// Id of the provider's active vibe, if it has one.
    pub fn active_vibe_id(&self) -> Option<String> {
        self.vibes.active_vibe().map(|vibe| vibe.id)
    }

    fn running(&self) -> Vec<RunningEffect> {
        self.active
            .iter()
            .filter(|effect| effect.is_live())
            .map(|effect| RunningEffect {
                id: effect.id.clone(),
                kind: effect.kind,
            })
            .collect()
    }

    fn blocked(&mut self, kind: EffectKind, reason: String) -> TriggerOutcome {
        warn!(effect = %kind, reason = reason.as_str(), "Effect blocked");
        self.events.push(Event::EffectBlocked {
            kind,
            reason: reason.clone(),
        });
        TriggerOutcome::Blocked { reason }
    }

    /// Runs traffic control and the shield, then starts the effect.
    ///
    /// Unknown types and bad parameters are errors with no side effects.
    /// Denials are `Ok(TriggerOutcome::Blocked)` and are also published.
    pub fn trigger(
        &mut self,
        trigger: EffectTrigger,
        now: Instant,
    ) -> Result<TriggerOutcome, EffectError> {
        let kind = trigger.kind();
        if !self.registry.contains(kind) {
            return Err(EffectError::UnknownEffect(kind.to_string()));
        }
        if !trigger.intensity.is_finite() {
            return Err(EffectError::InvalidParameter(format!(
                "intensity must be finite, got {}",
                trigger.intensity
            )));
        }

        let preempt = match traffic::evaluate(kind, &self.running(), self.max_active) {
            TrafficDecision::Allow { preempt } => preempt,
            TrafficDecision::Block { reason } => return Ok(self.blocked(kind, reason)),
        };

        let vibe = self.vibe();
        let constraints = match shield::evaluate(kind, &vibe) {
            ShieldDecision::Allow => None,
            ShieldDecision::Degrade(constraints) => Some(constraints),
            ShieldDecision::Block(reason) => return Ok(self.blocked(kind, reason)),
        };

        let mut instance = self.registry.create(&trigger.params)?;

        for id in &preempt {
            if let Some(incumbent) = self.active.iter_mut().find(|e| &e.id == id) {
                info!(effect = %incumbent.kind, id = id.as_str(), "Preempting effect");
                incumbent.abort();
            }
        }

        let id = format!("fx-{}", self.next_id);
        let seed = trigger.seed.unwrap_or(self.next_id);
        self.next_id += 1;

        if let Some(constraints) = &constraints {
            instance.apply_constraints(constraints);
        }
        let intensity = trigger.intensity.clamp(0.0, 1.0);
        instance.trigger(&TriggerContext {
            intensity,
            zones: trigger.zones,
            source: trigger.source.clone(),
            bpm: trigger.bpm.filter(|bpm| sane_bpm(*bpm)),
            harshness: trigger.harshness,
            seed,
        });

        let degraded = constraints.is_some();
        info!(
            effect = %kind,
            id = id.as_str(),
            intensity,
            source = trigger.source.as_str(),
            vibe = vibe.id.as_str(),
            degraded,
            "Effect fired"
        );
        self.events.push(Event::EffectTriggered {
            id: id.clone(),
            kind,
            intensity,
            source: trigger.source,
            vibe: Some(vibe.id),
            degraded,
        });
        self.active.push(ActiveEffect {
            id: id.clone(),
            kind,
            traits: kind.traits(),
            instance,
            started: now,
            last_update: now,
            max_duration: trigger.max_duration,
            aborted: false,
        });

        Ok(TriggerOutcome::Fired { id, degraded })
    }

    /// Advances every effect to `now` and retires finished ones.
    pub fn update(&mut self, now: Instant) {
        for effect in self.active.iter_mut() {
            if let Some(max) = effect.max_duration {
                if effect.is_live() && now.saturating_duration_since(effect.started) >= max {
                    debug!(id = effect.id.as_str(), "Effect reached its max duration");
                    effect.abort();
                }
            }
            let delta = now.saturating_duration_since(effect.last_update);
            effect.instance.update(delta);
            effect.last_update = now;
        }

        let (finished, live): (Vec<ActiveEffect>, Vec<ActiveEffect>) = self
            .active
            .drain(..)
            .partition(|effect| !effect.is_live());
        self.active = live;
        for effect in finished {
            info!(effect = %effect.kind, id = effect.id.as_str(), aborted = effect.aborted, "Effect finished");
            self.events.push(Event::EffectFinished {
                id: effect.id,
                kind: effect.kind,
                aborted: effect.aborted,
            });
        }
    }

    /// Composites every live effect. `None` when no effect is live.
    pub fn combined_output(&self) -> Option<CombinedOutput> {
        let live: Vec<&ActiveEffect> = self.active.iter().filter(|e| e.is_live()).collect();
        if live.is_empty() {
            return None;
        }

        let mut combined = EffectOutput::default();
        let mut bus: Option<(u8, MixBus)> = None;
        let mut color_priority = None;
        let mut movement_priority = None;
        let mut zone_priorities: HashMap<String, ZonePriorities> = HashMap::new();
        let mut all_zones = false;
        let mut zones = BTreeSet::new();

        for effect in &live {
            let priority = effect.traits.priority;
            let takes_bus = match bus {
                None => true,
                Some((p, _)) => {
                    priority > p
                        || (priority == p && effect.traits.mix_bus == MixBus::Dictatorial)
                }
            };
            if takes_bus {
                bus = Some((priority, effect.traits.mix_bus));
            }

            let Some(output) = effect.instance.output() else {
                continue;
            };

            let has_global = output.dimmer.is_some()
                || output.color.is_some()
                || output.white.is_some()
                || output.amber.is_some()
                || output.movement.is_some();
            if has_global {
                if output.zones.is_empty() {
                    all_zones = true;
                } else {
                    zones.extend(output.zones.iter().cloned());
                }
            }

            combined.dimmer = max_option(combined.dimmer, output.dimmer);
            combined.white = max_option(combined.white, output.white);
            combined.amber = max_option(combined.amber, output.amber);
            combined.strobe_rate = max_option(combined.strobe_rate, output.strobe_rate);
            if output.color.is_some() && outranks(priority, color_priority) {
                combined.color = output.color;
                color_priority = Some(priority);
            }
            if output.movement.is_some() && outranks(priority, movement_priority) {
                combined.movement = output.movement;
                movement_priority = Some(priority);
            }

            for (zone, zone_output) in output.zone_overrides {
                let priorities = zone_priorities.entry(zone.clone()).or_default();
                let merged = combined.zone_overrides.entry(zone).or_default();
                merged.dimmer = max_option(merged.dimmer, zone_output.dimmer);
                merged.white = max_option(merged.white, zone_output.white);
                merged.amber = max_option(merged.amber, zone_output.amber);
                if zone_output.color.is_some() && outranks(priority, priorities.color) {
                    merged.color = zone_output.color;
                    priorities.color = Some(priority);
                }
                if zone_output.movement.is_some() && outranks(priority, priorities.movement) {
                    merged.movement = zone_output.movement;
                    priorities.movement = Some(priority);
                }
                if outranks(priority, priorities.blend) {
                    merged.blend = zone_output.blend;
                    priorities.blend = Some(priority);
                }
            }
        }

        combined.zones = if all_zones {
            Vec::new()
        } else {
            zones.into_iter().collect()
        };

        Some(CombinedOutput {
            output: combined,
            mix_bus: bus.map(|(_, bus)| bus).unwrap_or_default(),
            active: live.len(),
        })
    }

    /// Strobe, blinder and freeze state across live effects. Blackout is
    /// filled in by the arbiter.
    pub fn summary(&self) -> GlobalEffectsSummary {
        let mut summary = GlobalEffectsSummary::default();
        for effect in self.active.iter().filter(|e| e.is_live()) {
            if effect.kind == EffectKind::Freeze {
                summary.freeze_active = true;
            }
            let Some(output) = effect.instance.output() else {
                continue;
            };
            if let Some(rate) = output.strobe_rate.filter(|rate| *rate > 0.0) {
                summary.strobe_active = true;
                summary.strobe_rate = summary.strobe_rate.max(rate);
            }
            if effect.traits.category == EffectCategory::Blinder {
                let intensity = output
                    .dimmer
                    .unwrap_or(0.0)
                    .max(output.white.unwrap_or(0.0));
                summary.blinder_active = true;
                summary.blinder_intensity = summary.blinder_intensity.max(intensity);
            }
        }
        summary
    }

    /// Aborts one effect. Takes effect on the next update.
    pub fn abort(&mut self, id: &str) -> bool {
        match self.active.iter_mut().find(|e| e.id == id && e.is_live()) {
            Some(effect) => {
                effect.abort();
                true
            }
            None => false,
        }
    }

    pub fn abort_kind(&mut self, kind: EffectKind) -> usize {
        let mut count = 0;
        for effect in self.active.iter_mut().filter(|e| e.kind == kind && e.is_live()) {
            effect.abort();
            count += 1;
        }
        count
    }

    pub fn abort_all(&mut self) -> usize {
        let mut count = 0;
        for effect in self.active.iter_mut().filter(|e| e.is_live()) {
            effect.abort();
            count += 1;
        }
        count
    }

    /// Drops every effect without notifications.
    pub fn clear(&mut self) {
        self.active.clear();
        self.events.clear();
    }

    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.active.iter().any(|e| e.kind == kind && e.is_live())
    }

    /// Live effects as `(id, kind, phase)`.
    pub fn active_effects(&self) -> Vec<(String, EffectKind, &'static str)> {
        self.active
            .iter()
            .filter(|e| e.is_live())
            .map(|e| (e.id.clone(), e.kind, e.instance.phase()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.active.iter().filter(|e| e.is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the lifecycle events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
