// SPDX-License-Identifier: GPL-3.0-only

//! Writes issued before the session runs
//!
//! Device property writes made while the session is not running never reach
//! the hardware. They are kept here (latest value per key) and replayed in
//! [`REPLAY_ORDER`] once the session reports running.

use crate::backends::camera::types::FlashMode;
use crate::constants::REPLAY_ORDER;
use crate::errors::{SessionError, SessionResult, WriteOutcome};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Keys that can be buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingKey {
    Zoom,
    Exposure,
    Torch,
    Flash,
}

/// A buffered device property write
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingWrite {
    Zoom(f32),
    Exposure(f32),
    Torch(bool),
    Flash(FlashMode),
}

impl PendingWrite {
    pub fn key(&self) -> PendingKey {
        match self {
            PendingWrite::Zoom(_) => PendingKey::Zoom,
            PendingWrite::Exposure(_) => PendingKey::Exposure,
            PendingWrite::Torch(_) => PendingKey::Torch,
            PendingWrite::Flash(_) => PendingKey::Flash,
        }
    }
}

/// Buffer of writes waiting for the session to run
#[derive(Debug, Default)]
pub struct PendingConfigBuffer {
    writes: Mutex<HashMap<PendingKey, PendingWrite>>,
}

impl PendingConfigBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PendingKey, PendingWrite>> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a write, replacing any earlier write for the same key
    pub fn set(&self, write: PendingWrite) {
        debug!(write = ?write, "Buffering write until session runs");
        self.lock().insert(write.key(), write);
    }

    pub fn get(&self, key: PendingKey) -> Option<PendingWrite> {
        self.lock().get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Remove and return all buffered writes in replay order
    pub fn drain_ordered(&self) -> Vec<PendingWrite> {
        let mut writes = std::mem::take(&mut *self.lock());
        REPLAY_ORDER
            .iter()
            .filter_map(|key| writes.remove(key))
            .collect()
    }

    /// Apply every buffered write in replay order, then leave the buffer empty
    ///
    /// A failing write does not stop the others; all failures are returned.
    pub fn replay<F>(&self, mut apply: F) -> Vec<SessionError>
    where
        F: FnMut(PendingWrite) -> SessionResult<WriteOutcome>,
    {
        let mut failures = Vec::new();
        for write in self.drain_ordered() {
            if let Err(e) = apply(write) {
                warn!(write = ?write, error = %e, "Buffered write failed on replay");
                failures.push(e);
            }
        }
        failures
    }
}
