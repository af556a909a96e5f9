//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

// == Entry Meta ==
/// Bookkeeping stamped on every write, shared with the maintenance pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    /// Time of the last write
    pub inserted_at: Instant,
    /// Expiration deadline, None = no expiration
    pub expires_at: Option<Instant>,
    /// Per-key write counter, strictly increasing across overwrites
    pub generation: u64,
}

impl EntryMeta {
    /// Stamps a write happening now.
    ///
    /// A TTL too large to be represented as a deadline means the entry never expires.
    pub fn stamp(ttl: Option<Duration>, generation: u64) -> Self {
        let now = Instant::now();
        Self {
            inserted_at: now,
            expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
            generation,
        }
    }

    // == Is Expired ==
    /// Checks whether the deadline has passed at `now`.
    ///
    /// Boundary condition: an entry is expired once `now >= expires_at`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Write metadata
    pub meta: EntryMeta,
}

impl<V> CacheEntry<V> {
    /// Creates a new cache entry with optional TTL.
    pub fn new(value: V, ttl: Option<Duration>, generation: u64) -> Self {
        Self {
            value,
            meta: EntryMeta::stamp(ttl, generation),
        }
    }

    /// Checks if the entry has expired.
    pub fn is_expired(&self) -> bool {
        self.meta.is_expired_at(Instant::now())
    }
}
