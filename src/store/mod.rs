/*
 * This file is a part of glintdb
 * glintdb is an in-memory key-value server speaking a partial
 * implementation of RESP3 over TCP.
 *
 * Copyright (c) glintdb contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! A single database: a concurrent key -> entry map with TTL, versioning and
//! a lazy-delete queue drained by the maintenance worker.

pub mod entry;

use dashmap::DashMap;
use parking_lot::RwLock;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::SystemTime;

pub use entry::{Entry, TtlUnit};

/// Default number of keys the maintenance sweep samples per store per pass.
/// Not fixed in the source this was distilled from; picked small and exposed
/// for tuning.
pub const DEFAULT_SWEEP_SAMPLES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteReason {
    TtlExpiry,
    Explicit,
}

#[derive(Debug, Clone, Copy)]
struct PendingDelete {
    version: u32,
    reason: DeleteReason,
}

pub struct Store {
    entries: DashMap<Vec<u8>, Entry>,
    pending_deletes: DashMap<Vec<u8>, PendingDelete>,
    /// Shared for command handlers, exclusive for the maintenance sweep.
    /// The map above is itself safely concurrent; this lock exists purely to
    /// keep a sweep from observing a store mid-handler and vice versa.
    sweep_gate: RwLock<()>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            pending_deletes: DashMap::new(),
            sweep_gate: RwLock::new(()),
        }
    }

    /// Look up `key`. Returns `None` on a miss or on an expired hit; an
    /// expired hit is additionally queued for lazy deletion. Never physically
    /// removes anything itself.
    pub fn get(&self, key: &[u8], now: SystemTime) -> Option<Vec<u8>> {
        let _gate = self.sweep_gate.read();
        let entry = self.entries.get(key)?;
        if entry.is_expired(now) {
            self.pending_deletes.insert(
                key.to_vec(),
                PendingDelete {
                    version: entry.version,
                    reason: DeleteReason::TtlExpiry,
                },
            );
            return None;
        }
        Some(entry.data.clone())
    }

    /// Insert or overwrite `key`. Always bumps the version on overwrite,
    /// starts fresh entries at version 1, and clears the tombstone.
    pub fn set(&self, key: &[u8], value: Vec<u8>, ttl: Option<SystemTime>) {
        let _gate = self.sweep_gate.read();
        match self.entries.get_mut(key) {
            Some(mut entry) => entry.overwrite(value, ttl),
            None => {
                self.entries.insert(key.to_vec(), Entry::fresh(value, ttl));
            }
        }
    }

    /// Maintenance-only: drain the pending-delete queue and sample random
    /// keys for expiry, both under the exclusive side of the sweep gate.
    pub fn handle_deletes(&self, now: SystemTime, max_samples: usize) {
        let _gate = self.sweep_gate.write();
        self.drain_pending_deletes();
        self.sample_and_evict(now, max_samples);
    }

    fn drain_pending_deletes(&self) {
        let pending: Vec<(Vec<u8>, PendingDelete)> = self
            .pending_deletes
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        self.pending_deletes.clear();

        for (key, pending) in pending {
            let Some(entry) = self.entries.get(&key) else {
                continue;
            };
            if entry.version != pending.version {
                // entry was overwritten since this deletion was posted
                continue;
            }
            let actually_expired = match pending.reason {
                DeleteReason::TtlExpiry => entry.ttl.is_some(),
                DeleteReason::Explicit => true,
            };
            if !(actually_expired || entry.deleted) {
                continue;
            }
            drop(entry);
            self.entries.remove(&key);
        }
    }

    fn sample_and_evict(&self, now: SystemTime, max_samples: usize) {
        let len = self.entries.len();
        if len == 0 {
            return;
        }
        let seed = now
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let mut rng = StdRng::seed_from_u64(seed);
        let keys: Vec<Vec<u8>> = self.entries.iter().map(|e| e.key().clone()).collect();
        let samples = max_samples.min(keys.len());
        for _ in 0..samples {
            let idx = rng.gen_range(0..keys.len());
            let key = &keys[idx];
            if let Some(entry) = self.entries.get(key) {
                if entry.is_expired(now) {
                    drop(entry);
                    self.entries.remove(key);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
