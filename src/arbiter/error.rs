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
use crate::effects::EffectError;

/// A command the arbiter refused. Nothing is mutated when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    #[error("Unknown fixture: {0}")]
    UnknownFixture(String),
    #[error("Manual override capacity of {max} reached")]
    OverrideCapacity { max: usize },
    #[error("Malformed override: {0}")]
    MalformedOverride(String),
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error(transparent)]
    Effect(#[from] EffectError),
}
