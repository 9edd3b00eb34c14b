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
//! The two base layers: the AI intent and the consciousness modifier on top of it.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::color::Hsl;
use crate::providers::MusicalContext;

use super::types::{ChannelType, Fixture};

/// Per-zone refinements of the AI intent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneIntent {
    pub dimmer: Option<f64>,
    pub color: Option<Hsl>,
}

/// What the AI layer wants the rig to look like. Intensities are 0-1, the
/// movement centre is 0-1 on both axes, and physics positions are absolute DMX
/// pan/tilt values per fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct AiIntent {
    pub master_intensity: f64,
    pub primary: Hsl,
    pub white: f64,
    pub amber: f64,
    pub movement_center: (f64, f64),
    pub zoom: f64,
    pub focus: f64,
    pub zones: HashMap<String, ZoneIntent>,
    pub fixture_positions: HashMap<String, (f64, f64)>,
    pub context: MusicalContext,
}

impl Default for AiIntent {
    fn default() -> Self {
        AiIntent {
            master_intensity: 0.0,
            primary: Hsl::BLACK,
            white: 0.0,
            amber: 0.0,
            movement_center: (0.5, 0.5),
            zoom: 0.5,
            focus: 0.5,
            zones: HashMap::new(),
            fixture_positions: HashMap::new(),
            context: MusicalContext::default(),
        }
    }
}

impl AiIntent {
    /// The value this intent asks for on a fixture channel, in the DMX domain.
    pub fn channel_value(&self, fixture: &Fixture, channel: ChannelType) -> f64 {
        let zone = self.zones.get(&fixture.zone);
        let color = zone.and_then(|z| z.color).unwrap_or(self.primary);
        match channel {
            ChannelType::Dimmer => {
                zone.and_then(|z| z.dimmer).unwrap_or(self.master_intensity) * 255.0
            }
            ChannelType::Red => color.to_rgb().0,
            ChannelType::Green => color.to_rgb().1,
            ChannelType::Blue => color.to_rgb().2,
            ChannelType::White => self.white * 255.0,
            ChannelType::Amber => self.amber * 255.0,
            ChannelType::Pan => match self.fixture_positions.get(&fixture.id) {
                Some((pan, _)) => *pan,
                None => self.movement_center.0 * 255.0,
            },
            ChannelType::Tilt => match self.fixture_positions.get(&fixture.id) {
                Some((_, tilt)) => *tilt,
                None => self.movement_center.1 * 255.0,
            },
            ChannelType::Zoom => self.zoom * 255.0,
            ChannelType::Focus => self.focus * 255.0,
        }
    }
}

/// The AI layer as held by the arbiter.
#[derive(Debug, Clone)]
pub(crate) struct AiLayer {
    pub intent: AiIntent,
    pub updated_at: Instant,
    pub populated: bool,
}

impl AiLayer {
    pub fn new(now: Instant) -> AiLayer {
        AiLayer {
            intent: AiIntent::default(),
            updated_at: now,
            populated: false,
        }
    }
}

/// A modifier applied on top of the AI intent.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsciousnessModifier {
    pub active: bool,
    pub hue_shift: f64,
    pub saturation_scale: f64,
    pub lightness_scale: f64,
    pub dimmer_scale: f64,
    /// A colour to blend the primary towards, by `blend_amount`.
    pub primary_override: Option<Hsl>,
    pub blend_amount: f64,
    /// The modifier lapses after this long. `None` lasts until replaced.
    pub ttl: Option<Duration>,
}

impl Default for ConsciousnessModifier {
    fn default() -> Self {
        ConsciousnessModifier {
            active: true,
            hue_shift: 0.0,
            saturation_scale: 1.0,
            lightness_scale: 1.0,
            dimmer_scale: 1.0,
            primary_override: None,
            blend_amount: 0.0,
            ttl: None,
        }
    }
}

impl ConsciousnessModifier {
    fn modify_color(&self, color: Hsl) -> Hsl {
        let mut color = color.rotate(self.hue_shift);
        color.s = (color.s * self.saturation_scale).clamp(0.0, 1.0);
        color.l = (color.l * self.lightness_scale).clamp(0.0, 1.0);
        match self.primary_override {
            Some(target) => color.lerp(&target, self.blend_amount),
            None => color,
        }
    }

    /// Returns the intent with this modifier applied.
    pub fn apply(&self, intent: &AiIntent) -> AiIntent {
        let mut modified = intent.clone();
        modified.primary = self.modify_color(intent.primary);
        modified.master_intensity = (intent.master_intensity * self.dimmer_scale).clamp(0.0, 1.0);
        for zone in modified.zones.values_mut() {
            zone.color = zone.color.map(|c| self.modify_color(c));
            zone.dimmer = zone.dimmer.map(|d| (d * self.dimmer_scale).clamp(0.0, 1.0));
        }
        modified
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ConsciousnessLayer {
    pub modifier: ConsciousnessModifier,
    pub set_at: Instant,
}

impl ConsciousnessLayer {
    pub fn is_live(&self, now: Instant) -> bool {
        if !self.modifier.active {
            return false;
        }
        match self.modifier.ttl {
            Some(ttl) => now.saturating_duration_since(self.set_at) < ttl,
            None => true,
        }
    }
}
