//! Typed Cache Module
//!
//! Public cache handle. Writes land in the entry store immediately and are
//! then recorded for the maintenance task, which applies LRU eviction and TTL
//! expiry asynchronously.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::recorder::{self, AccessRecorder, RecordOutcome};
use crate::cache::EntryStore;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::spawn_maintenance_task;

// == Put Options ==
/// Per-write overrides for [`CacheOf::put_and_wait_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// TTL of this entry, None = cache default
    pub ttl: Option<Duration>,
    /// How long to wait for maintenance to confirm the write, None = no limit
    pub timeout: Option<Duration>,
}

impl PutOptions {
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

struct Inner<V> {
    store: Arc<EntryStore<V>>,
    recorder: AccessRecorder,
    config: CacheConfig,
    shutdown: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

// == Cache Of ==
/// In-memory cache of `V` values keyed by string.
///
/// Cloning is cheap; every clone shares the same entries and maintenance
/// task. The task stops when [`CacheOf::shutdown`] is called or the last
/// clone is dropped.
pub struct CacheOf<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for CacheOf<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V: Send + Sync + 'static> CacheOf<V> {
    // == Constructor ==
    /// Creates a cache and spawns its maintenance task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current().map_err(|_| {
            CacheError::Internal("cache must be created inside a Tokio runtime".to_string())
        })?;

        let store = Arc::new(EntryStore::new());
        let (recorder, drain) = recorder::channel(config.event_queue_capacity);
        let shutdown = Arc::new(Notify::new());
        let task = spawn_maintenance_task(store.clone(), drain, &config, shutdown.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                recorder,
                config,
                shutdown,
                task: Mutex::new(Some(task)),
            }),
        })
    }

    /// Creates a cache holding at most `capacity` entries, defaults elsewhere.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::new(CacheConfig::with_capacity(capacity))
    }
}

impl<V> CacheOf<V> {
    // == Put And Forget ==
    /// Stores `value` under `key` without waiting for maintenance.
    ///
    /// The value is visible to [`CacheOf::get`] as soon as this returns.
    pub fn put_and_forget(&self, key: impl Into<String>, value: V) {
        self.put_and_forget_with_ttl(key, value, None);
    }

    /// Same as [`CacheOf::put_and_forget`] with a per-entry TTL.
    pub fn put_and_forget_with_ttl(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let meta = self.inner.store.upsert(key.clone(), value, self.effective_ttl(ttl));
        if self.inner.recorder.record_write(key, meta) == RecordOutcome::Closed {
            debug!("Maintenance stopped, write will not be tracked for eviction");
        }
    }

    // == Put And Wait ==
    /// Stores `value` under `key` and waits until maintenance has applied the
    /// write, including any eviction and expiry it caused.
    pub async fn put_and_wait(&self, key: impl Into<String>, value: V) -> Result<()> {
        self.put_and_wait_with(key, value, PutOptions::default()).await
    }

    /// Same as [`CacheOf::put_and_wait`] with a per-entry TTL.
    pub async fn put_and_wait_with_ttl(
        &self,
        key: impl Into<String>,
        value: V,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let options = PutOptions {
            ttl,
            ..PutOptions::default()
        };
        self.put_and_wait_with(key, value, options).await
    }

    /// Same as [`CacheOf::put_and_wait`], giving up after `timeout`.
    ///
    /// On [`CacheError::Timeout`] the value stays stored and maintenance still
    /// applies the write later.
    pub async fn put_and_wait_timeout(
        &self,
        key: impl Into<String>,
        value: V,
        timeout: Duration,
    ) -> Result<()> {
        self.put_and_wait_with(key, value, PutOptions::default().timeout(timeout))
            .await
    }

    /// Waited write with explicit options.
    pub async fn put_and_wait_with(
        &self,
        key: impl Into<String>,
        value: V,
        options: PutOptions,
    ) -> Result<()> {
        let key = key.into();
        let meta = self
            .inner
            .store
            .upsert(key.clone(), value, self.effective_ttl(options.ttl));

        let Some(timeout) = options.timeout else {
            let token = self.inner.recorder.record_write_tracked(key, meta).await?;
            return token.processed().await;
        };

        let deadline = tokio::time::Instant::now() + timeout;
        let enqueue = self.inner.recorder.record_write_tracked(key.clone(), meta);
        let token = match tokio::time::timeout_at(deadline, enqueue).await {
            Ok(token) => token?,
            Err(_) => {
                // Never queued; have maintenance pick the write up from the store
                self.inner.recorder.request_resync();
                return Err(CacheError::Timeout { key, waited: timeout });
            }
        };

        match tokio::time::timeout_at(deadline, token.processed()).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout { key, waited: timeout }),
        }
    }

    // == Remove ==
    /// Removes `key`. Returns true if a live entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        let Some(meta) = self.inner.store.delete(key) else {
            return false;
        };
        self.inner
            .recorder
            .record_remove(key.to_string(), meta.generation);
        !meta.is_expired_at(Instant::now())
    }

    // == Length ==
    /// Number of physically present entries.
    ///
    /// Expired entries count until maintenance sweeps them.
    pub fn len(&self) -> usize {
        self.inner.store.size()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Configured maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.inner.config.capacity
    }

    /// Returns true while the maintenance task is consuming events.
    pub fn is_running(&self) -> bool {
        !self.inner.recorder.is_closed()
    }

    // == Shutdown ==
    /// Stops the maintenance task after it has applied every pending event.
    ///
    /// Values stay readable afterwards, but writes are no longer tracked
    /// for eviction and waited writes fail with [`CacheError::Closed`].
    /// Concurrent callers all return only once the task has stopped.
    pub async fn shutdown(&self) {
        self.inner.shutdown.notify_one();
        // Held until the task is joined so later callers wait behind it
        let mut task = self.inner.task.lock().await;
        if let Some(handle) = task.take() {
            if let Err(e) = handle.await {
                warn!("Maintenance task ended abnormally: {}", e);
            }
        }
    }

    fn effective_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        ttl.or(self.inner.config.default_ttl)
    }
}

impl<V: Clone> CacheOf<V> {
    // == Get ==
    /// Returns the value stored under `key`, or None if absent or expired.
    ///
    /// A hit is recorded as an access for LRU ordering.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.inner.store.lookup(key)?;
        self.inner.recorder.record_read(key);
        Some(entry.value)
    }
}
