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
use serde::Deserialize;

use crate::arbiter::types::{ChannelType, Fixture};

/// A YAML representation of a patched fixture.
#[derive(Deserialize, Clone)]
pub(crate) struct FixtureConfig {
    id: String,
    #[serde(default = "default_zone")]
    zone: String,
    #[serde(rename = "type", default = "default_type")]
    fixture_type: String,
    channels: Vec<ChannelType>,
}

fn default_zone() -> String {
    "default".to_string()
}

fn default_type() -> String {
    "generic".to_string()
}

impl FixtureConfig {
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    /// Converts to a registry fixture. Capabilities follow the channel list.
    pub(crate) fn to_fixture(&self) -> Fixture {
        Fixture::new(
            &self.id,
            &self.zone,
            &self.fixture_type,
            self.channels.clone(),
        )
    }
}
