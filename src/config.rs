//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from
//! environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};

// == Cache Config ==
/// Construction-time parameters of a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub capacity: usize,
    /// TTL applied to writes that do not carry their own, None = never expire
    pub default_ttl: Option<Duration>,
    /// Period of the TTL sweep run by the maintenance task without traffic
    pub maintenance_interval: Duration,
    /// Bound of the access event queue
    pub event_queue_capacity: usize,
    /// Maximum number of events applied per maintenance pass
    pub max_batch: usize,
}

impl CacheConfig {
    /// Creates a config with the given capacity and defaults elsewhere.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Sets the default TTL.
    pub fn default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the TTL sweep period.
    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    /// Sets the event queue bound.
    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    /// Sets the maximum batch size.
    pub fn max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    // == Validate ==
    /// Rejects configurations the maintenance pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if self.event_queue_capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "event queue capacity must be greater than zero".to_string(),
            ));
        }
        if self.max_batch == 0 {
            return Err(CacheError::InvalidConfig(
                "max batch must be greater than zero".to_string(),
            ));
        }
        if self.maintenance_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "maintenance interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            default_ttl: Some(Duration::from_secs(300)),
            maintenance_interval: Duration::from_secs(1),
            event_queue_capacity: 4096,
            max_batch: 512,
        }
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Parameters of the served cache
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds, 0 disables it (default: 300000)
    /// - `MAINTENANCE_INTERVAL_MS` - TTL sweep period in milliseconds (default: 1000)
    /// - `EVENT_QUEUE_CAPACITY` - Access event queue bound (default: 4096)
    /// - `MAINTENANCE_BATCH` - Events applied per maintenance pass (default: 512)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = CacheConfig::default();
        let default_ttl_ms = defaults
            .default_ttl
            .map(|ttl| ttl.as_millis() as u64)
            .unwrap_or(0);

        let default_ttl = match env_or("DEFAULT_TTL_MS", default_ttl_ms) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Self {
            cache: CacheConfig {
                capacity: env_or("MAX_ENTRIES", defaults.capacity),
                default_ttl,
                maintenance_interval: Duration::from_millis(env_or(
                    "MAINTENANCE_INTERVAL_MS",
                    defaults.maintenance_interval.as_millis() as u64,
                )),
                event_queue_capacity: env_or("EVENT_QUEUE_CAPACITY", defaults.event_queue_capacity),
                max_batch: env_or("MAINTENANCE_BATCH", defaults.max_batch),
            },
            server_port: env_or("SERVER_PORT", 3000),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
        }
    }
}

/// Reads and parses an environment variable, falling back on absence or parse failure.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
