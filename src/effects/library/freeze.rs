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
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{mismatched, require_timeline, EffectParams};
use crate::effects::phase::{Phase, PhaseClock};
use crate::effects::{EffectError, EffectKind, EffectOutput, LightEffect, TriggerContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezeParams {
    pub duration_ms: u64,
}

impl Default for FreezeParams {
    fn default() -> Self {
        FreezeParams { duration_ms: 3000 }
    }
}

/// Holds the rig on its last frame. The effect produces no output of its own;
/// the arbiter sees it in the active set and repeats the previous target.
pub struct Freeze {
    clock: PhaseClock,
}

pub fn create(params: &EffectParams) -> Result<Box<dyn LightEffect>, EffectError> {
    let EffectParams::Freeze(params) = params else {
        return Err(mismatched(EffectKind::Freeze, params));
    };
    require_timeline("duration_ms", &[params.duration_ms])?;
    if params.duration_ms == 0 {
        return Err(EffectError::InvalidParameter(
            "freeze duration must be non-zero".to_string(),
        ));
    }
    Ok(Box::new(Freeze {
        clock: PhaseClock::new(vec![Phase::millis("hold", params.duration_ms)]),
    }))
}

impl LightEffect for Freeze {
    fn kind(&self) -> EffectKind {
        EffectKind::Freeze
    }

    fn trigger(&mut self, _context: &TriggerContext) {
        self.clock.reset();
    }

    fn update(&mut self, delta: Duration) {
        self.clock.advance(delta);
    }

    fn output(&self) -> Option<EffectOutput> {
        None
    }

    fn is_finished(&self) -> bool {
        self.clock.is_finished()
    }

    fn abort(&mut self) {
        self.clock.finish();
    }

    fn phase(&self) -> &'static str {
        self.clock.phase_name()
    }

    fn expected_duration(&self) -> Duration {
        self.clock.total()
    }
}
