//! Size-capped buffer of entries waiting for the next flush.
//!
//! Producers append under a single mutex. When the cache is at capacity the
//! caller's overflow policy decides whether to wait for the flush worker to
//! drain it, wait with a deadline, or discard the new entry; in every case the
//! length never exceeds the capacity. [`BoundedCache::drain`] swaps the buffer
//! for an empty one so producers keep appending while the taken batch is
//! written outside the lock.

use std::mem;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::config::OverflowPolicy;
use crate::entry::FlatEntry;

/// Why an entry was not appended.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache is full")]
    Full,
    #[error("cache stayed full until the overflow timeout")]
    Timeout,
    #[error("cache is closed")]
    Closed,
}

struct CacheState {
    entries: Vec<FlatEntry>,
    closed: bool,
}

pub struct BoundedCache {
    state: Mutex<CacheState>,
    space: Condvar,
    capacity: usize,
}

impl BoundedCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(CacheState {
                entries: Vec::with_capacity(capacity),
                closed: false,
            }),
            space: Condvar::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `entry` and return the new length.
    ///
    /// When the cache is full `on_full` is invoked (while the lock is held, so
    /// it must not block) to request an emergency flush, then `policy` decides
    /// whether to wait for space.
    pub fn push(
        &self,
        entry: FlatEntry,
        policy: OverflowPolicy,
        on_full: impl Fn(),
    ) -> Result<usize, CacheError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CacheError::Closed);
        }
        if state.entries.len() >= self.capacity {
            on_full();
            match policy {
                OverflowPolicy::Drop => return Err(CacheError::Full),
                OverflowPolicy::Block => {
                    while state.entries.len() >= self.capacity && !state.closed {
                        self.space.wait(&mut state);
                    }
                }
                OverflowPolicy::Timeout(wait) => {
                    let deadline = Instant::now() + wait;
                    while state.entries.len() >= self.capacity && !state.closed {
                        if self.space.wait_until(&mut state, deadline).timed_out()
                            && state.entries.len() >= self.capacity
                        {
                            return Err(CacheError::Timeout);
                        }
                    }
                }
            }
            if state.closed {
                return Err(CacheError::Closed);
            }
        }
        state.entries.push(entry);
        Ok(state.entries.len())
    }

    /// Take every cached entry, leaving an empty buffer behind.
    pub fn drain(&self) -> Vec<FlatEntry> {
        let mut state = self.state.lock();
        if state.entries.is_empty() {
            return Vec::new();
        }
        let batch = mem::replace(&mut state.entries, Vec::with_capacity(self.capacity));
        drop(state);
        self.space.notify_all();
        batch
    }

    /// Reject further appends and release producers waiting for space.
    /// Entries already cached stay available to [`BoundedCache::drain`].
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.space.notify_all();
    }
}
