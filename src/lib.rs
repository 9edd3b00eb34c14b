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
//! Real-time lighting control arbitration.
//!
//! The [`arbiter::Arbiter`] mixes five control layers (AI, consciousness, manual,
//! effects and blackout) into one deterministic value per fixture channel every
//! frame. Effects are admitted through the [`effects::manager::EffectManager`],
//! which applies traffic control and the vibe shield before instantiating them.
pub mod arbiter;
pub mod color;
pub mod config;
pub mod effects;
pub mod events;
pub mod providers;
pub mod runner;
pub mod shared;
#[cfg(test)]
mod testutil;
