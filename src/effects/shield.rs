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
//! Permission gate for effects ("shield"), driven by the active vibe.
use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{EffectConstraints, EffectKind};

/// Strobe rates below this many Hz force strobing effects into degraded mode.
pub const DEGRADED_STROBE_THRESHOLD: f64 = 8.0;
/// Intensity caps below this force effects into degraded mode.
pub const DEGRADED_INTENSITY_THRESHOLD: f64 = 0.5;

fn default_true() -> bool {
    true
}

/// A read-only policy describing what effects the current vibe allows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibeProfile {
    pub id: String,
    #[serde(default)]
    pub allowed: BTreeSet<EffectKind>,
    #[serde(default)]
    pub max_strobe_rate: f64,
    #[serde(default)]
    pub max_intensity: f64,
    /// When false, effects tagged dynamic are refused.
    #[serde(default = "default_true")]
    pub allow_dynamic: bool,
    /// When strobing is forbidden, let strobe effects run in their non-strobing
    /// substitute mode instead of refusing them.
    #[serde(default)]
    pub strobe_substitute: bool,
}

impl VibeProfile {
    /// The profile used when no vibe is available: nothing is allowed.
    pub fn restrictive() -> VibeProfile {
        VibeProfile {
            id: "restricted".to_string(),
            allowed: BTreeSet::new(),
            max_strobe_rate: 0.0,
            max_intensity: 0.0,
            allow_dynamic: false,
            strobe_substitute: false,
        }
    }

    /// A profile that allows every effect at full rate.
    pub fn unrestricted(id: &str) -> VibeProfile {
        VibeProfile {
            id: id.to_string(),
            allowed: EffectKind::ALL.into_iter().collect(),
            max_strobe_rate: 20.0,
            max_intensity: 1.0,
            allow_dynamic: true,
            strobe_substitute: false,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.max_strobe_rate.is_finite() || self.max_strobe_rate < 0.0 {
            return Err(format!(
                "vibe {}: max_strobe_rate must be non-negative",
                self.id
            ));
        }
        if !(0.0..=1.0).contains(&self.max_intensity) {
            return Err(format!("vibe {}: max_intensity must be 0-1", self.id));
        }
        Ok(())
    }
}

/// Pull-style access to the active vibe.
pub trait VibeProvider: Send + Sync {
    /// The active profile, or `None` when no vibe is available yet.
    fn active_vibe(&self) -> Option<VibeProfile>;
}

/// No vibe is ever available.
pub struct NoVibe;

impl VibeProvider for NoVibe {
    fn active_vibe(&self) -> Option<VibeProfile> {
        None
    }
}

/// A fixed vibe.
pub struct StaticVibe(pub VibeProfile);

impl VibeProvider for StaticVibe {
    fn active_vibe(&self) -> Option<VibeProfile> {
        Some(self.0.clone())
    }
}

/// Named vibe profiles with a switchable active selection.
pub struct VibeLibrary {
    profiles: HashMap<String, VibeProfile>,
    active: RwLock<Option<String>>,
}

impl VibeLibrary {
    pub fn new(profiles: Vec<VibeProfile>, active: Option<String>) -> VibeLibrary {
        VibeLibrary {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
            active: RwLock::new(active),
        }
    }

    /// Switches the active vibe. Returns false if the id is unknown.
    pub fn select(&self, id: &str) -> bool {
        if !self.profiles.contains_key(id) {
            return false;
        }
        info!(vibe = id, "Vibe selected");
        *self.active.write() = Some(id.to_string());
        true
    }

    pub fn active_id(&self) -> Option<String> {
        self.active.read().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.profiles.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl VibeProvider for VibeLibrary {
    fn active_vibe(&self) -> Option<VibeProfile> {
        let active = self.active.read();
        active.as_ref().and_then(|id| self.profiles.get(id).cloned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShieldDecision {
    Allow,
    Degrade(EffectConstraints),
    Block(String),
}

/// Checks an effect type against a vibe.
pub fn evaluate(kind: EffectKind, vibe: &VibeProfile) -> ShieldDecision {
    let traits = kind.traits();

    if !vibe.allowed.contains(&kind) {
        return ShieldDecision::Block(format!("vibe {} does not allow {}", vibe.id, kind));
    }

    if traits.dynamic && !vibe.allow_dynamic {
        return ShieldDecision::Block(format!(
            "vibe {} forbids dynamic effects like {}",
            vibe.id, kind
        ));
    }

    let constraints = EffectConstraints {
        max_strobe_rate: vibe.max_strobe_rate,
        max_intensity: vibe.max_intensity,
        degraded: true,
    };

    if traits.requires_strobe && vibe.max_strobe_rate <= 0.0 {
        if vibe.strobe_substitute {
            return ShieldDecision::Degrade(constraints);
        }
        return ShieldDecision::Block(format!(
            "vibe {} forbids strobing and {} requires it",
            vibe.id, kind
        ));
    }

    if (traits.requires_strobe && vibe.max_strobe_rate < DEGRADED_STROBE_THRESHOLD)
        || vibe.max_intensity < DEGRADED_INTENSITY_THRESHOLD
    {
        return ShieldDecision::Degrade(constraints);
    }

    ShieldDecision::Allow
}

#[cfg(test)]
mod test {
    use super::*;

    fn vibe(max_strobe_rate: f64, max_intensity: f64) -> VibeProfile {
        VibeProfile {
            max_strobe_rate,
            max_intensity,
            ..VibeProfile::unrestricted("test")
        }
    }

    #[test]
    fn restrictive_blocks_everything() {
        let vibe = VibeProfile::restrictive();
        for kind in EffectKind::ALL {
            assert!(matches!(evaluate(kind, &vibe), ShieldDecision::Block(_)));
        }
    }

    #[test]
    fn unrestricted_allows() {
        assert_eq!(
            evaluate(EffectKind::StrobeStorm, &vibe(20.0, 1.0)),
            ShieldDecision::Allow
        );
    }

    #[test]
    fn calm_vibe_blocks_dynamic() {
        let calm = VibeProfile {
            allow_dynamic: false,
            ..vibe(20.0, 1.0)
        };
        assert!(matches!(
            evaluate(EffectKind::TidalWave, &calm),
            ShieldDecision::Block(_)
        ));
        assert_eq!(evaluate(EffectKind::GhostBreath, &calm), ShieldDecision::Allow);
    }

    #[test]
    fn zero_strobe_blocks_or_substitutes() {
        let no_strobe = vibe(0.0, 1.0);
        assert!(matches!(
            evaluate(EffectKind::StrobeStorm, &no_strobe),
            ShieldDecision::Block(_)
        ));

        let substitute = VibeProfile {
            strobe_substitute: true,
            ..no_strobe
        };
        match evaluate(EffectKind::StrobeStorm, &substitute) {
            ShieldDecision::Degrade(constraints) => {
                assert_eq!(constraints.max_strobe_rate, 0.0);
                assert!(constraints.degraded);
            }
            other => panic!("expected degrade, got {:?}", other),
        }
    }

    #[test]
    fn low_limits_degrade() {
        assert!(matches!(
            evaluate(EffectKind::StrobeStorm, &vibe(5.0, 1.0)),
            ShieldDecision::Degrade(_)
        ));
        // Slow strobe caps only matter to strobing effects.
        assert_eq!(
            evaluate(EffectKind::SolarFlare, &vibe(5.0, 1.0)),
            ShieldDecision::Allow
        );
        assert!(matches!(
            evaluate(EffectKind::SolarFlare, &vibe(20.0, 0.4)),
            ShieldDecision::Degrade(_)
        ));
    }

    #[test]
    fn library_switches_active_vibe() {
        let library = VibeLibrary::new(
            vec![VibeProfile::unrestricted("club"), VibeProfile::restrictive()],
            None,
        );
        assert!(library.active_vibe().is_none());
        assert!(library.select("club"));
        assert_eq!(library.active_vibe().unwrap().id, "club");
        assert!(!library.select("missing"));
        assert_eq!(library.active_id().as_deref(), Some("club"));
    }
}
