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
//! Static traits of every effect type.
//!
//! Priority, mix bus, traffic tags and shield rules are properties of the
//! type, never of an instance, so admission decisions depend only on which
//! types are running.
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::MixBus;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    StrobeStorm,
    SolarFlare,
    SeismicSnap,
    TidalWave,
    GhostBreath,
    CumbiaMoon,
    BinaryGlitch,
    ClaveRhythm,
    Freeze,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectCategory {
    Strobe,
    Blinder,
    Impact,
    Wave,
    Atmosphere,
    Glitch,
    Rhythm,
    Utility,
}

/// Energy bands used for mutual exclusion. Two effects in the same band
/// cannot run together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyZone {
    Peak,
    Groove,
    Valley,
}

impl fmt::Display for EnergyZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnergyZone::Peak => "peak",
            EnergyZone::Groove => "groove",
            EnergyZone::Valley => "valley",
        })
    }
}

/// Traffic-control tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EffectTags {
    pub critical: bool,
    pub ambient: bool,
    pub atmospheric: bool,
    pub emergency: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectTraits {
    pub category: EffectCategory,
    pub priority: u8,
    pub mix_bus: MixBus,
    pub tags: EffectTags,
    pub energy_zone: Option<EnergyZone>,
    pub requires_strobe: bool,
    pub dynamic: bool,
    pub nominal_duration: Duration,
}

const NO_TAGS: EffectTags = EffectTags {
    critical: false,
    ambient: false,
    atmospheric: false,
    emergency: false,
};

const CRITICAL: EffectTags = EffectTags {
    critical: true,
    ..NO_TAGS
};

const AMBIENT: EffectTags = EffectTags {
    ambient: true,
    atmospheric: true,
    ..NO_TAGS
};

impl EffectKind {
    pub const ALL: [EffectKind; 9] = [
        EffectKind::StrobeStorm,
        EffectKind::SolarFlare,
        EffectKind::SeismicSnap,
        EffectKind::TidalWave,
        EffectKind::GhostBreath,
        EffectKind::CumbiaMoon,
        EffectKind::BinaryGlitch,
        EffectKind::ClaveRhythm,
        EffectKind::Freeze,
    ];

    pub fn traits(self) -> EffectTraits {
        match self {
            EffectKind::StrobeStorm => EffectTraits {
                category: EffectCategory::Strobe,
                priority: 90,
                mix_bus: MixBus::Additive,
                tags: CRITICAL,
                energy_zone: Some(EnergyZone::Peak),
                requires_strobe: true,
                dynamic: true,
                nominal_duration: Duration::from_millis(800),
            },
            EffectKind::SolarFlare => EffectTraits {
                category: EffectCategory::Blinder,
                priority: 85,
                mix_bus: MixBus::Additive,
                tags: CRITICAL,
                energy_zone: None,
                requires_strobe: false,
                dynamic: true,
                nominal_duration: Duration::from_millis(1080),
            },
            EffectKind::SeismicSnap => EffectTraits {
                category: EffectCategory::Impact,
                priority: 78,
                mix_bus: MixBus::Dictatorial,
                tags: CRITICAL,
                energy_zone: Some(EnergyZone::Peak),
                requires_strobe: false,
                dynamic: true,
                nominal_duration: Duration::from_millis(1500),
            },
            EffectKind::TidalWave => EffectTraits {
                category: EffectCategory::Wave,
                priority: 60,
                mix_bus: MixBus::Additive,
                tags: NO_TAGS,
                energy_zone: Some(EnergyZone::Groove),
                requires_strobe: false,
                dynamic: true,
                nominal_duration: Duration::from_millis(2000),
            },
            EffectKind::GhostBreath => EffectTraits {
                category: EffectCategory::Atmosphere,
                priority: 25,
                mix_bus: MixBus::Additive,
                tags: AMBIENT,
                energy_zone: Some(EnergyZone::Valley),
                requires_strobe: false,
                dynamic: false,
                nominal_duration: Duration::from_millis(8000),
            },
            EffectKind::CumbiaMoon => EffectTraits {
                category: EffectCategory::Atmosphere,
                priority: 30,
                mix_bus: MixBus::Additive,
                tags: AMBIENT,
                energy_zone: Some(EnergyZone::Valley),
                requires_strobe: false,
                dynamic: false,
                nominal_duration: Duration::from_millis(10000),
            },
            EffectKind::BinaryGlitch => EffectTraits {
                category: EffectCategory::Glitch,
                priority: 80,
                mix_bus: MixBus::Dictatorial,
                tags: NO_TAGS,
                energy_zone: Some(EnergyZone::Peak),
                requires_strobe: true,
                dynamic: true,
                nominal_duration: Duration::from_millis(1200),
            },
            EffectKind::ClaveRhythm => EffectTraits {
                category: EffectCategory::Rhythm,
                priority: 55,
                mix_bus: MixBus::Additive,
                tags: NO_TAGS,
                energy_zone: Some(EnergyZone::Groove),
                requires_strobe: false,
                dynamic: true,
                nominal_duration: Duration::from_millis(4000),
            },
            EffectKind::Freeze => EffectTraits {
                category: EffectCategory::Utility,
                priority: 100,
                mix_bus: MixBus::Additive,
                tags: EffectTags {
                    emergency: true,
                    ..NO_TAGS
                },
                energy_zone: None,
                requires_strobe: false,
                dynamic: false,
                nominal_duration: Duration::from_millis(3000),
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EffectKind::StrobeStorm => "strobe_storm",
            EffectKind::SolarFlare => "solar_flare",
            EffectKind::SeismicSnap => "seismic_snap",
            EffectKind::TidalWave => "tidal_wave",
            EffectKind::GhostBreath => "ghost_breath",
            EffectKind::CumbiaMoon => "cumbia_moon",
            EffectKind::BinaryGlitch => "binary_glitch",
            EffectKind::ClaveRhythm => "clave_rhythm",
            EffectKind::Freeze => "freeze",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        EffectKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown effect type: {}", s))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_parse_back() {
        for kind in EffectKind::ALL {
            assert_eq!(kind.to_string().parse::<EffectKind>(), Ok(kind));
        }
        assert_eq!("Strobe-Storm".parse::<EffectKind>(), Ok(EffectKind::StrobeStorm));
        assert!("disco_ball".parse::<EffectKind>().is_err());
    }

    #[test]
    fn strobe_effects_are_dynamic() {
        for kind in EffectKind::ALL {
            let traits = kind.traits();
            if traits.requires_strobe {
                assert!(traits.dynamic, "{} strobes but is not dynamic", kind);
            }
        }
    }

    #[test]
    fn ambient_effects_are_not_critical() {
        for kind in EffectKind::ALL {
            let tags = kind.traits().tags;
            assert!(!(tags.ambient && tags.critical), "{}", kind);
        }
    }
}
