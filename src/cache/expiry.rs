//! Expiry Index Module
//!
//! Orders keys by TTL deadline for the maintenance sweep.

use std::collections::BTreeMap;
use std::time::Instant;

/// Position of a key in the expiry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExpiryToken {
    deadline: Instant,
    seq: u64,
}

impl ExpiryToken {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

// == Expiry Index ==
/// Keys indexed by deadline, earliest first; equal deadlines keep insertion order.
#[derive(Debug, Default)]
pub struct ExpiryIndex {
    order: BTreeMap<ExpiryToken, String>,
    next_seq: u64,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `key` to expire at `deadline`.
    pub fn insert(&mut self, key: String, deadline: Instant) -> ExpiryToken {
        let token = ExpiryToken {
            deadline,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.order.insert(token, key);
        token
    }

    /// Unschedules a key.
    pub fn remove(&mut self, token: ExpiryToken) -> Option<String> {
        self.order.remove(&token)
    }

    // == Pop Due ==
    /// Removes and returns the earliest key whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(ExpiryToken, String)> {
        let (token, _) = self.order.first_key_value()?;
        if token.deadline > now {
            return None;
        }
        self.order.pop_first()
    }

    /// Earliest scheduled deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.order.keys().next().map(|token| token.deadline)
    }

}
