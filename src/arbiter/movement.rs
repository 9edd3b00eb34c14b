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
//! Spatial modifiers applied to pan/tilt after the base merge.
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Share of the full 0-255 range a pattern of size 1.0 sweeps either side of centre.
const PATTERN_AMPLITUDE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternShape {
    Circle,
    Eight,
    Sweep,
}

impl PatternShape {
    /// Unit offset at the given phase angle.
    pub fn offset(self, angle: f64) -> (f64, f64) {
        match self {
            PatternShape::Circle => (angle.cos(), angle.sin()),
            PatternShape::Eight => (angle.sin(), (2.0 * angle).sin() / 2.0),
            PatternShape::Sweep => (angle.sin(), 0.0),
        }
    }
}

impl fmt::Display for PatternShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatternShape::Circle => "circle",
            PatternShape::Eight => "eight",
            PatternShape::Sweep => "sweep",
        })
    }
}

impl FromStr for PatternShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "circle" => Ok(PatternShape::Circle),
            "eight" | "figure8" | "figure_eight" => Ok(PatternShape::Eight),
            "sweep" => Ok(PatternShape::Sweep),
            _ => Err(format!("unknown pattern: {}", s)),
        }
    }
}

/// A procedural movement pattern: `speed` in cycles per second, `size` 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub shape: PatternShape,
    pub speed: f64,
    pub size: f64,
}

#[derive(Debug, Clone)]
struct ActivePattern {
    config: PatternConfig,
    started: Instant,
}

impl ActivePattern {
    fn offset(&self, now: Instant) -> (f64, f64) {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        let angle = TAU * self.config.speed.max(0.0) * elapsed;
        let (x, y) = self.config.shape.offset(angle);
        let amplitude = self.config.size.clamp(0.0, 1.0) * PATTERN_AMPLITUDE * 255.0;
        (x * amplitude, y * amplitude)
    }
}

/// A group of fixtures holding fixed offsets from a shared centre.
#[derive(Debug, Clone, PartialEq)]
pub struct Formation {
    pub id: String,
    pub members: Vec<String>,
    pub center: (f64, f64),
    pub fan: f64,
    offsets: HashMap<String, (f64, f64)>,
}

impl Formation {
    pub fn position(&self, fixture_id: &str) -> Option<(f64, f64)> {
        self.offsets.get(fixture_id).map(|(dx, dy)| {
            (
                self.center.0 + dx * self.fan,
                self.center.1 + dy * self.fan,
            )
        })
    }
}

/// Pattern and formation assignments, by fixture. Formations are kept in
/// creation order; a fixture in several formations follows the oldest.
#[derive(Debug, Default)]
pub struct MovementModifiers {
    patterns: HashMap<String, ActivePattern>,
    formations: Vec<Formation>,
}

impl MovementModifiers {
    pub fn set_pattern(&mut self, fixture_ids: &[String], config: PatternConfig, now: Instant) {
        for id in fixture_ids {
            self.patterns.insert(
                id.clone(),
                ActivePattern {
                    config,
                    started: now,
                },
            );
        }
    }

    pub fn clear_pattern(&mut self, fixture_ids: &[String]) {
        for id in fixture_ids {
            self.patterns.remove(id);
        }
    }

    /// Creates a formation, capturing each member's offset from `center` using
    /// `current_position`. An existing formation with this id keeps the offsets
    /// of members it already had, captures offsets for new members and drops
    /// members no longer listed.
    pub fn set_formation(
        &mut self,
        id: &str,
        members: &[String],
        center: (f64, f64),
        fan: f64,
        current_position: impl Fn(&str) -> (f64, f64),
    ) {
        let capture = |member: &String| {
            let (pan, tilt) = current_position(member);
            (pan - center.0, tilt - center.1)
        };

        if let Some(existing) = self.formations.iter_mut().find(|f| f.id == id) {
            existing.offsets.retain(|member, _| members.contains(member));
            for member in members {
                if !existing.offsets.contains_key(member) {
                    existing.offsets.insert(member.clone(), capture(member));
                }
            }
            existing.members = members.to_vec();
            existing.center = center;
            existing.fan = fan;
            return;
        }

        let offsets = members
            .iter()
            .map(|member| (member.clone(), capture(member)))
            .collect();
        self.formations.push(Formation {
            id: id.to_string(),
            members: members.to_vec(),
            center,
            fan,
            offsets,
        });
    }

    pub fn clear_formation(&mut self, id: &str) -> bool {
        let before = self.formations.len();
        self.formations.retain(|formation| formation.id != id);
        self.formations.len() != before
    }

    pub fn formation(&self, id: &str) -> Option<&Formation> {
        self.formations.iter().find(|formation| formation.id == id)
    }

    /// Applies the fixture's modifier to the merged pan/tilt. A pattern adds an
    /// offset and takes precedence; a formation replaces the position.
    pub fn apply(&self, fixture_id: &str, base: (f64, f64), now: Instant) -> (f64, f64) {
        if let Some(pattern) = self.patterns.get(fixture_id) {
            let (dx, dy) = pattern.offset(now);
            return (base.0 + dx, base.1 + dy);
        }
        self.formations
            .iter()
            .find_map(|formation| formation.position(fixture_id))
            .unwrap_or(base)
    }

    /// Forgets fixtures that fail the predicate.
    pub fn retain_fixtures(&mut self, keep: impl Fn(&str) -> bool) {
        self.patterns.retain(|id, _| keep(id));
        for formation in self.formations.iter_mut() {
            formation.members.retain(|id| keep(id));
            formation.offsets.retain(|id, _| keep(id));
        }
        self.formations.retain(|formation| !formation.members.is_empty());
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn formation_count(&self) -> usize {
        self.formations.len()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
        self.formations.clear();
    }
}
