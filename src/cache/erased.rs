//! Untyped Cache Module
//!
//! A cache of arbitrary values, erasing the value type on the way in.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheOf;
use crate::config::CacheConfig;
use crate::error::Result;

/// A type-erased cached value.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

// == Cache ==
/// In-memory cache holding values of any type.
///
/// Thin wrapper over [`CacheOf<AnyValue>`]; every operation delegates to it.
#[derive(Clone)]
pub struct Cache {
    inner: CacheOf<AnyValue>,
}

impl Cache {
    /// Creates a cache and spawns its maintenance task.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Ok(Self {
            inner: CacheOf::new(config)?,
        })
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::new(CacheConfig::with_capacity(capacity))
    }

    pub fn put_and_forget<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.inner.put_and_forget(key, erase(value));
    }

    pub fn put_and_forget_with_ttl<T: Any + Send + Sync>(
        &self,
        key: impl Into<String>,
        value: T,
        ttl: Option<Duration>,
    ) {
        self.inner.put_and_forget_with_ttl(key, erase(value), ttl);
    }

    pub async fn put_and_wait<T: Any + Send + Sync>(
        &self,
        key: impl Into<String>,
        value: T,
    ) -> Result<()> {
        self.inner.put_and_wait(key, erase(value)).await
    }

    pub async fn put_and_wait_with_ttl<T: Any + Send + Sync>(
        &self,
        key: impl Into<String>,
        value: T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.inner.put_and_wait_with_ttl(key, erase(value), ttl).await
    }

    pub async fn put_and_wait_timeout<T: Any + Send + Sync>(
        &self,
        key: impl Into<String>,
        value: T,
        timeout: Duration,
    ) -> Result<()> {
        self.inner
            .put_and_wait_timeout(key, erase(value), timeout)
            .await
    }

    pub fn get(&self, key: &str) -> Option<AnyValue> {
        self.inner.get(key)
    }

    /// Returns a copy of the value under `key` if it is a `T`.
    pub fn get_as<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.get(key)?.downcast_ref::<T>().cloned()
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    pub async fn shutdown(&self) {
        self.inner.shutdown().await;
    }
}

fn erase<T: Any + Send + Sync>(value: T) -> AnyValue {
    Arc::new(value)
}
