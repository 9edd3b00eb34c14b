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
//! Per-channel merge disciplines.
//!
//! Intensity channels merge highest-takes-precedence (HTP): the largest offered
//! value wins. Everything else merges latest-takes-precedence (LTP): the most
//! recently updated layer wins, except that a manual claim always wins outright.
use std::time::Instant;

use super::types::{ChannelType, ControlLayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Htp,
    Ltp,
}

impl MergeStrategy {
    pub fn for_channel(channel: ChannelType) -> MergeStrategy {
        match channel {
            ChannelType::Dimmer | ChannelType::White | ChannelType::Amber => MergeStrategy::Htp,
            _ => MergeStrategy::Ltp,
        }
    }
}

/// A value offered for a channel by one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub layer: ControlLayer,
    pub value: f64,
    pub timestamp: Instant,
}

impl Candidate {
    pub fn new(layer: ControlLayer, value: f64, timestamp: Instant) -> Candidate {
        Candidate {
            layer,
            value,
            timestamp,
        }
    }
}

/// The outcome of merging one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merged {
    pub value: f64,
    pub layer: ControlLayer,
}

/// Highest value wins; ties go to the higher-priority layer.
pub fn merge_htp(candidates: &[Candidate]) -> Option<Merged> {
    candidates
        .iter()
        .filter(|c| !c.value.is_nan())
        .max_by(|a, b| {
            a.value
                .total_cmp(&b.value)
                .then(a.layer.priority().cmp(&b.layer.priority()))
        })
        .map(|c| Merged {
            value: c.value,
            layer: c.layer,
        })
}

/// Manual wins outright when present. Otherwise the most recent timestamp wins,
/// with ties going to the higher-priority layer.
pub fn merge_ltp(candidates: &[Candidate]) -> Option<Merged> {
    if let Some(manual) = candidates
        .iter()
        .find(|c| c.layer == ControlLayer::Manual && !c.value.is_nan())
    {
        return Some(Merged {
            value: manual.value,
            layer: manual.layer,
        });
    }

    candidates
        .iter()
        .filter(|c| !c.value.is_nan())
        .max_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.layer.priority().cmp(&b.layer.priority()))
        })
        .map(|c| Merged {
            value: c.value,
            layer: c.layer,
        })
}

/// Merges the candidates for a channel. With nothing usable on offer the
/// channel falls back to its safe-zero, credited to the AI layer.
pub fn merge_channel(channel: ChannelType, candidates: &[Candidate]) -> Merged {
    let merged = match MergeStrategy::for_channel(channel) {
        MergeStrategy::Htp => merge_htp(candidates),
        MergeStrategy::Ltp => merge_ltp(candidates),
    };
    merged.unwrap_or(Merged {
        value: channel.safe_zero(),
        layer: ControlLayer::Ai,
    })
}

/// Clamps a DMX-domain value to 0-255 with round-half-up. NaN becomes the
/// channel's safe-zero.
pub fn clamp_channel(channel: ChannelType, value: f64) -> u8 {
    if value.is_nan() {
        return channel.safe_zero() as u8;
    }
    clamp_dmx(value)
}

/// Clamps to 0-255 with round-half-up. NaN maps to 0.
pub fn clamp_dmx(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 255.0) + 0.5).floor() as u8
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn htp_takes_max() {
        let now = Instant::now();
        let merged = merge_htp(&[
            Candidate::new(ControlLayer::Ai, 100.0, now),
            Candidate::new(ControlLayer::Effects, 200.0, now),
            Candidate::new(ControlLayer::Manual, 150.0, now),
        ])
        .unwrap();
        assert_eq!(merged.value, 200.0);
        assert_eq!(merged.layer, ControlLayer::Effects);
    }

    #[test]
    fn htp_tie_goes_to_higher_layer() {
        let now = Instant::now();
        let merged = merge_htp(&[
            Candidate::new(ControlLayer::Effects, 120.0, now),
            Candidate::new(ControlLayer::Ai, 120.0, now),
        ])
        .unwrap();
        assert_eq!(merged.layer, ControlLayer::Effects);
    }

    #[test]
    fn ltp_latest_wins() {
        let now = Instant::now();
        let merged = merge_ltp(&[
            Candidate::new(ControlLayer::Effects, 10.0, now),
            Candidate::new(ControlLayer::Ai, 20.0, now + Duration::from_millis(5)),
        ])
        .unwrap();
        assert_eq!(merged.value, 20.0);
        assert_eq!(merged.layer, ControlLayer::Ai);
    }

    #[test]
    fn ltp_manual_wins_regardless_of_recency() {
        let now = Instant::now();
        let merged = merge_ltp(&[
            Candidate::new(ControlLayer::Manual, 10.0, now),
            Candidate::new(ControlLayer::Ai, 20.0, now + Duration::from_secs(10)),
        ])
        .unwrap();
        assert_eq!(merged.value, 10.0);
        assert_eq!(merged.layer, ControlLayer::Manual);
    }

    #[test]
    fn empty_falls_back_to_safe_zero() {
        let pan = merge_channel(ChannelType::Pan, &[]);
        assert_eq!(pan.value, 128.0);
        let dimmer = merge_channel(ChannelType::Dimmer, &[]);
        assert_eq!(dimmer.value, 0.0);
    }

    #[test]
    fn clamp_rounds_half_up() {
        assert_eq!(clamp_dmx(-10.0), 0);
        assert_eq!(clamp_dmx(300.0), 255);
        assert_eq!(clamp_dmx(127.5), 128);
        assert_eq!(clamp_dmx(127.49), 127);
        assert_eq!(clamp_dmx(f64::NAN), 0);
        assert_eq!(clamp_channel(ChannelType::Tilt, f64::NAN), 128);
        assert_eq!(clamp_dmx(f64::INFINITY), 255);
    }
}
