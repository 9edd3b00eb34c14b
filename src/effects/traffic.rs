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
//! Concurrency admission for effects ("traffic control").
//!
//! Rules run in a fixed order and the first failure blocks with a reason that
//! names the incumbent effect. Decisions depend only on the candidate type
//! and the types already running.
use super::{EffectKind, MixBus};

/// An effect already running, as seen by traffic control.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningEffect {
    pub id: String,
    pub kind: EffectKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrafficDecision {
    /// Admit the candidate, aborting the listed incumbents first.
    Allow { preempt: Vec<String> },
    Block { reason: String },
}

fn block(reason: String) -> TrafficDecision {
    TrafficDecision::Block { reason }
}

pub fn evaluate(
    candidate: EffectKind,
    running: &[RunningEffect],
    max_active: usize,
) -> TrafficDecision {
    let traits = candidate.traits();
    let mut preempt = Vec::new();

    // Global lock held by a dictatorial effect.
    for incumbent in running {
        if incumbent.kind.traits().mix_bus != MixBus::Dictatorial {
            continue;
        }
        let incumbent_emergency = incumbent.kind.traits().tags.emergency;
        if traits.tags.emergency && !incumbent_emergency {
            preempt.push(incumbent.id.clone());
            continue;
        }
        return block(format!(
            "global lock held by dictatorial effect {} ({})",
            incumbent.kind, incumbent.id
        ));
    }

    let remaining: Vec<&RunningEffect> = running
        .iter()
        .filter(|effect| !preempt.contains(&effect.id))
        .collect();

    if traits.tags.ambient {
        if let Some(critical) = remaining.iter().find(|e| e.kind.traits().tags.critical) {
            return block(format!(
                "critical effect {} ({}) is running; ambient effects are held back",
                critical.kind, critical.id
            ));
        }
    }

    if let Some(duplicate) = remaining.iter().find(|e| e.kind == candidate) {
        return block(format!("{} is already running ({})", candidate, duplicate.id));
    }

    if traits.tags.atmospheric {
        if let Some(atmosphere) = remaining.iter().find(|e| e.kind.traits().tags.atmospheric) {
            return block(format!(
                "atmospheric effect {} ({}) is already running",
                atmosphere.kind, atmosphere.id
            ));
        }
    }

    if let Some(zone) = traits.energy_zone {
        if let Some(occupant) = remaining
            .iter()
            .find(|e| e.kind.traits().energy_zone == Some(zone))
        {
            return block(format!(
                "energy zone {} is occupied by {} ({})",
                zone, occupant.kind, occupant.id
            ));
        }
    }

    if remaining.len() >= max_active {
        return block(format!("effect capacity of {} reached", max_active));
    }

    TrafficDecision::Allow { preempt }
}
