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

//! A fixed-capacity buffer pool bucketed by power-of-two size, used to back
//! connection read buffers. Buffers are leased via [`PooledBuffer`], an RAII
//! guard that returns its backing storage to the pool on drop — scoped
//! return on release, regardless of which path the connection task exits by.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Bound on how many buffers the overflow bucket may have outstanding at
/// once; overflow allocation is strictly additive to the fixed buckets and
/// must not grow without limit.
pub const DEFAULT_OVERFLOW_LIMIT: usize = 1024;

struct Bucket {
    size: usize,
    slots: Vec<Mutex<Option<Vec<u8>>>>,
    free: Mutex<VecDeque<usize>>,
}

impl Bucket {
    fn new(size: usize, capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Mutex::new(Some(vec![0u8; size])))
            .collect();
        let free = Mutex::new((0..capacity).collect());
        Self { size, slots, free }
    }

    fn try_acquire(&self) -> Option<(usize, Vec<u8>)> {
        let idx = self.free.lock().pop_front()?;
        let buf = self.slots[idx].lock().take().expect("slot double-acquired");
        Some((idx, buf))
    }

    fn release(&self, idx: usize, mut buf: Vec<u8>) {
        buf.clear();
        buf.resize(self.size, 0);
        *self.slots[idx].lock() = Some(buf);
        self.free.lock().push_back(idx);
    }
}

enum Lease {
    Bucket { bucket: usize, slot: usize },
    Overflow,
}

pub struct BufferPool {
    buckets: Vec<Bucket>,
    overflow_outstanding: AtomicUsize,
    overflow_limit: usize,
}

impl BufferPool {
    /// `base` is the smallest bucket's buffer size; `num_buckets` buckets are
    /// built at sizes `base << 0 .. base << (num_buckets - 1)`, each with
    /// `capacity_per_bucket` pre-allocated buffers.
    pub fn new(base: usize, num_buckets: usize, capacity_per_bucket: usize) -> Self {
        let buckets = (0..num_buckets)
            .map(|i| Bucket::new(base << i, capacity_per_bucket))
            .collect();
        Self {
            buckets,
            overflow_outstanding: AtomicUsize::new(0),
            overflow_limit: DEFAULT_OVERFLOW_LIMIT,
        }
    }

    /// Acquire a buffer able to hold at least `requested_size` bytes.
    /// Returns `None` only if every bucket large enough is exhausted and the
    /// overflow bucket has hit its limit.
    pub fn acquire(self: &Arc<Self>, requested_size: usize) -> Option<PooledBuffer> {
        for (i, bucket) in self.buckets.iter().enumerate() {
            if bucket.size >= requested_size {
                if let Some((slot, buf)) = bucket.try_acquire() {
                    return Some(PooledBuffer {
                        pool: Arc::clone(self),
                        lease: Lease::Bucket { bucket: i, slot },
                        buf,
                    });
                }
            }
        }
        self.acquire_overflow(requested_size)
    }

    fn acquire_overflow(self: &Arc<Self>, requested_size: usize) -> Option<PooledBuffer> {
        let mut cur = self.overflow_outstanding.load(Ordering::Acquire);
        loop {
            if cur >= self.overflow_limit {
                return None;
            }
            match self.overflow_outstanding.compare_exchange_weak(
                cur,
                cur + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
        Some(PooledBuffer {
            pool: Arc::clone(self),
            lease: Lease::Overflow,
            buf: vec![0u8; requested_size],
        })
    }

    fn release(&self, lease: &Lease, buf: Vec<u8>) {
        match lease {
            Lease::Bucket { bucket, slot } => self.buckets[*bucket].release(*slot, buf),
            Lease::Overflow => {
                self.overflow_outstanding.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }

    #[cfg(test)]
    fn outstanding(&self) -> usize {
        let bucketed: usize = self
            .buckets
            .iter()
            .map(|b| b.slots.len() - b.free.lock().len())
            .sum();
        bucketed + self.overflow_outstanding.load(Ordering::Acquire)
    }
}

/// An RAII lease on a pool-owned buffer. Returns its storage to the pool when
/// dropped, regardless of which path the connection task exits by.
pub struct PooledBuffer {
    pool: Arc<BufferPool>,
    lease: Lease,
    buf: Vec<u8>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;
    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.release(&self.lease, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_is_conserved() {
        let pool = Arc::new(BufferPool::new(64, 2, 4));
        assert_eq!(pool.outstanding(), 0);
        let a = pool.acquire(64).unwrap();
        let b = pool.acquire(64).unwrap();
        assert_eq!(pool.outstanding(), 2);
        drop(a);
        assert_eq!(pool.outstanding(), 1);
        drop(b);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn exhaustion_falls_through_to_overflow() {
        let pool = Arc::new(BufferPool::new(16, 1, 1));
        let _a = pool.acquire(16).unwrap();
        // bucket exhausted, overflow covers it
        let b = pool.acquire(16).unwrap();
        assert!(matches!(b.lease, Lease::Overflow));
    }

    #[test]
    fn picks_smallest_sufficient_bucket() {
        let pool = Arc::new(BufferPool::new(16, 3, 1)); // 16, 32, 64
        let buf = pool.acquire(20).unwrap();
        assert_eq!(buf.buf.len(), 32);
    }
}
