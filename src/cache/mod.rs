//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and LRU eviction, with
//! policy bookkeeping applied asynchronously by a maintenance task.

mod entry;
mod erased;
mod expiry;
mod lru;
mod policy;
pub(crate) mod recorder;
mod store;
mod typed;


// Re-export public types
pub use entry::{CacheEntry, EntryMeta};
pub use erased::{AnyValue, Cache};
pub use expiry::{ExpiryIndex, ExpiryToken};
pub use lru::{LruTracker, RecencyToken};
pub use policy::{PolicyEngine, PolicyFault, ReconcileReport, RemovalCause, Victim};
pub use recorder::{
    AccessEvent, AccessRecorder, EventDrain, EventToken, QueuedEvent, RecordOutcome,
};
pub use store::EntryStore;
pub use typed::{CacheOf, PutOptions};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
