//! Policy Engine Module
//!
//! Decides which entries leave the cache. Holds the recency order and the
//! expiry order; owned and mutated by the maintenance pipeline only.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use thiserror::Error;

use crate::cache::expiry::{ExpiryIndex, ExpiryToken};
use crate::cache::lru::{LruTracker, RecencyToken};
use crate::cache::EntryMeta;

// == Policy Fault ==
/// Bookkeeping inconsistency detected while applying one event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyFault {
    #[error("recency token of key '{0}' is dangling")]
    DanglingToken(String),

    #[error("deadline of key '{0}' precedes its write")]
    MalformedDeadline(String),
}

// == Removal ==
/// Why a key left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// Deadline passed
    Expired,
    /// Least recently used while over capacity
    Evicted,
}

/// A key the engine decided to remove, tagged with the generation the
/// decision was taken on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Victim {
    pub key: String,
    pub generation: u64,
    pub cause: RemovalCause,
}

#[derive(Debug)]
struct Tracked {
    generation: u64,
    recency: RecencyToken,
    expiry: Option<ExpiryToken>,
}

/// Outcome of a reconcile pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Tracked keys no longer present in the store
    pub dropped: usize,
    /// Present keys that were not tracked
    pub adopted: usize,
}

// == Policy Engine ==
#[derive(Debug)]
pub struct PolicyEngine {
    capacity: usize,
    tracked: HashMap<String, Tracked>,
    lru: LruTracker,
    expiry: ExpiryIndex,
}

impl PolicyEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tracked: HashMap::new(),
            lru: LruTracker::new(),
            expiry: ExpiryIndex::new(),
        }
    }

    // == On Insert ==
    /// Records a write. Returns the size delta: 1 for a new key, 0 for an overwrite.
    ///
    /// The key becomes the most recently used and its deadline is replaced.
    /// A write older than the tracked generation only counts as an access.
    pub fn on_insert(&mut self, key: &str, meta: EntryMeta) -> Result<usize, PolicyFault> {
        if let Some(deadline) = meta.expires_at {
            if deadline < meta.inserted_at {
                return Err(PolicyFault::MalformedDeadline(key.to_string()));
            }
        }

        if !self.tracked.contains_key(key) {
            let recency = self.lru.push_front(key.to_string());
            let expiry = meta
                .expires_at
                .map(|deadline| self.expiry.insert(key.to_string(), deadline));
            self.tracked.insert(
                key.to_string(),
                Tracked {
                    generation: meta.generation,
                    recency,
                    expiry,
                },
            );
            return Ok(1);
        }

        let Some(tracked) = self.tracked.get_mut(key) else {
            return Ok(0);
        };

        if !self.lru.touch(tracked.recency) {
            return Err(PolicyFault::DanglingToken(key.to_string()));
        }
        if meta.generation <= tracked.generation {
            return Ok(0);
        }

        if let Some(old) = tracked.expiry.take() {
            self.expiry.remove(old);
        }
        tracked.expiry = meta
            .expires_at
            .map(|deadline| self.expiry.insert(key.to_string(), deadline));
        tracked.generation = meta.generation;
        Ok(0)
    }

    // == On Access ==
    /// Moves a tracked key to the most recently used end. Untracked keys are ignored.
    pub fn on_access(&mut self, key: &str) -> Result<(), PolicyFault> {
        match self.tracked.get(key) {
            Some(tracked) if !self.lru.touch(tracked.recency) => {
                Err(PolicyFault::DanglingToken(key.to_string()))
            }
            _ => Ok(()),
        }
    }

    // == On Remove ==
    /// Drops bookkeeping for a key removed by a caller at `generation`.
    ///
    /// Ignored when a newer write has already been recorded.
    pub fn on_remove(&mut self, key: &str, generation: u64) -> bool {
        let superseded = self
            .tracked
            .get(key)
            .map_or(true, |tracked| tracked.generation > generation);
        if superseded {
            return false;
        }
        self.untrack(key).is_some()
    }

    // == Evict If Over Capacity ==
    /// Removes least recently used keys until the tracked size fits the capacity.
    ///
    /// A victim already past its deadline at `now` is reported as expired.
    pub fn evict_if_over_capacity(&mut self, now: Instant) -> Vec<Victim> {
        let mut victims = Vec::new();

        while self.tracked.len() > self.capacity {
            let Some(key) = self.lru.evict_oldest() else {
                break;
            };
            let Some(tracked) = self.tracked.remove(&key) else {
                continue;
            };

            let mut cause = RemovalCause::Evicted;
            if let Some(token) = tracked.expiry {
                self.expiry.remove(token);
                if token.deadline() <= now {
                    cause = RemovalCause::Expired;
                }
            }

            victims.push(Victim {
                key,
                generation: tracked.generation,
                cause,
            });
        }

        victims
    }

    // == Expire Due ==
    /// Removes every key whose deadline is at or before `now`, earliest first.
    pub fn expire_due(&mut self, now: Instant) -> Vec<Victim> {
        let mut victims = Vec::new();

        while let Some((token, key)) = self.expiry.pop_due(now) {
            let Some(tracked) = self.tracked.remove(&key) else {
                continue;
            };
            if tracked.expiry != Some(token) {
                // Index and tracking disagree; keep the tracked deadline authoritative
                self.tracked.insert(key, tracked);
                continue;
            }
            self.lru.remove(tracked.recency);
            victims.push(Victim {
                key,
                generation: tracked.generation,
                cause: RemovalCause::Expired,
            });
        }

        victims
    }

    // == Reconcile ==
    /// Rebuilds bookkeeping against a snapshot of the store.
    ///
    /// Keys missing from the snapshot are dropped; untracked keys are adopted
    /// at the most recently used end in write order; refreshed generations
    /// update their deadline.
    pub fn reconcile(&mut self, mut snapshot: Vec<(String, EntryMeta)>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let live: HashSet<&str> = snapshot.iter().map(|(key, _)| key.as_str()).collect();
        let gone: Vec<String> = self
            .tracked
            .keys()
            .filter(|key| !live.contains(key.as_str()))
            .cloned()
            .collect();
        for key in gone {
            self.untrack(&key);
            report.dropped += 1;
        }

        snapshot.sort_by_key(|(_, meta)| meta.generation);
        for (key, meta) in snapshot {
            let newer = match self.tracked.get(&key) {
                Some(tracked) => tracked.generation < meta.generation,
                None => {
                    report.adopted += 1;
                    false
                }
            };

            if newer {
                // Rewrite deadline without disturbing recency
                if let Some(tracked) = self.tracked.get_mut(&key) {
                    if let Some(old) = tracked.expiry.take() {
                        self.expiry.remove(old);
                    }
                    tracked.expiry = meta
                        .expires_at
                        .map(|deadline| self.expiry.insert(key.clone(), deadline));
                    tracked.generation = meta.generation;
                }
            } else if !self.tracked.contains_key(&key) {
                let meta = EntryMeta {
                    expires_at: meta.expires_at.filter(|d| *d >= meta.inserted_at),
                    ..meta
                };
                // Cannot fault: deadline was sanitized and the key is untracked
                let _ = self.on_insert(&key, meta);
            }
        }

        report
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tracked.contains_key(key)
    }

    /// Earliest deadline currently scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.expiry.next_deadline()
    }

    fn untrack(&mut self, key: &str) -> Option<Tracked> {
        let tracked = self.tracked.remove(key)?;
        self.lru.remove(tracked.recency);
        if let Some(token) = tracked.expiry {
            self.expiry.remove(token);
        }
        Some(tracked)
    }
}
