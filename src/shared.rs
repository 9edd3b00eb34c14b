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
//! The exclusive-access boundary for commands that arrive from other threads.
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::arbiter::Arbiter;

/// An arbiter that may be commanded from any thread. A tick holds the lock
/// for the whole arbitration pass, so a frame never observes a torn write.
#[derive(Clone)]
pub struct SharedArbiter {
    inner: Arc<Mutex<Arbiter>>,
}

impl SharedArbiter {
    pub fn new(arbiter: Arbiter) -> SharedArbiter {
        SharedArbiter {
            inner: Arc::new(Mutex::new(arbiter)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Arbiter> {
        self.inner.lock()
    }

    /// Runs `f` with exclusive access to the arbiter.
    pub fn with<R>(&self, f: impl FnOnce(&mut Arbiter) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
