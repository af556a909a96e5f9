//! Mini Cache - A bounded in-memory cache
//!
//! Provides string-keyed caching with LRU eviction and TTL expiration. Writes
//! are visible immediately; eviction and expiry bookkeeping is applied by a
//! background maintenance task, which waited writes can synchronize with.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheOf, PutOptions};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, Result};
