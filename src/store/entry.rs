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

use std::time::{Duration, SystemTime};

/// Sentinel meaning "no TTL" — the entry is persistent.
pub const NEVER: Option<SystemTime> = None;

#[derive(Debug, Clone)]
pub struct Entry {
    pub data: Vec<u8>,
    pub version: u32,
    pub ttl: Option<SystemTime>,
    pub deleted: bool,
}

impl Entry {
    pub fn fresh(data: Vec<u8>, ttl: Option<SystemTime>) -> Self {
        Self {
            data,
            version: 1,
            ttl,
            deleted: false,
        }
    }

    /// Overwrite this entry in place as part of a `set`, bumping its version.
    pub fn overwrite(&mut self, data: Vec<u8>, ttl: Option<SystemTime>) {
        self.data = data;
        self.ttl = ttl;
        self.deleted = false;
        self.version = self.version.wrapping_add(1).max(1);
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        match self.ttl {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// Absolute deadline from a relative TTL expressed in seconds or milliseconds.
pub fn deadline_from(now: SystemTime, amount: i64, unit: TtlUnit) -> Option<SystemTime> {
    if amount <= 0 {
        return None;
    }
    let dur = match unit {
        TtlUnit::Seconds => Duration::from_secs(amount as u64),
        TtlUnit::Millis => Duration::from_millis(amount as u64),
    };
    Some(now + dur)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlUnit {
    Seconds,
    Millis,
}
