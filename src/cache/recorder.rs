//! Access Recorder Module
//!
//! Carries access events from callers to the maintenance pipeline. Writes
//! and removals travel on one bounded queue, reads on another, so a burst of
//! recency touches can never crowd out a write. Recording never runs policy
//! logic inline.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use flume::TrySendError;
use tokio::sync::oneshot;
use tracing::{trace, warn};

use crate::cache::EntryMeta;
use crate::error::{CacheError, Result};

// == Access Event ==
/// One recorded access, consumed exactly once by the maintenance pipeline.
#[derive(Debug)]
pub enum AccessEvent {
    /// A key was written
    Write {
        key: String,
        meta: EntryMeta,
        /// Signalled once the batch holding this event is fully applied
        completion: Option<oneshot::Sender<()>>,
    },
    /// A key was read
    Read { key: String },
    /// A key was removed by a caller
    Remove { key: String, generation: u64 },
}

impl AccessEvent {
    pub fn key(&self) -> &str {
        match self {
            AccessEvent::Write { key, .. }
            | AccessEvent::Read { key }
            | AccessEvent::Remove { key, .. } => key,
        }
    }
}

/// An event stamped with its submission order across both queues.
#[derive(Debug)]
pub struct QueuedEvent {
    seq: u64,
    event: AccessEvent,
}

impl QueuedEvent {
    pub fn into_event(self) -> AccessEvent {
        self.event
    }
}

/// What happened to a fire-and-forget event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Queued,
    /// Queue full; the pipeline will catch up from the store instead
    Dropped,
    /// The pipeline has stopped
    Closed,
}

// == Event Token ==
/// Resolves once the maintenance pipeline has applied the tracked event.
#[derive(Debug)]
pub struct EventToken {
    rx: oneshot::Receiver<()>,
}

impl EventToken {
    /// Waits for the pipeline's confirmation.
    ///
    /// Fails with [`CacheError::Closed`] if the pipeline stopped without
    /// applying the event.
    pub async fn processed(self) -> Result<()> {
        self.rx.await.map_err(|_| CacheError::Closed)
    }
}

/// Creates a connected recorder and drain pair.
///
/// The write queue and the read queue each hold up to `capacity` events.
pub fn channel(capacity: usize) -> (AccessRecorder, EventDrain) {
    let (writes_tx, writes_rx) = flume::bounded(capacity);
    let (reads_tx, reads_rx) = flume::bounded(capacity);
    let resync = Arc::new(AtomicBool::new(false));
    (
        AccessRecorder {
            writes: writes_tx,
            reads: reads_tx,
            next_seq: Arc::new(AtomicU64::new(0)),
            resync: resync.clone(),
        },
        EventDrain {
            writes: writes_rx,
            reads: reads_rx,
            resync,
        },
    )
}

// == Access Recorder ==
/// Producer side, cloned into every cache handle.
#[derive(Debug, Clone)]
pub struct AccessRecorder {
    writes: flume::Sender<QueuedEvent>,
    reads: flume::Sender<QueuedEvent>,
    next_seq: Arc<AtomicU64>,
    resync: Arc<AtomicBool>,
}

impl AccessRecorder {
    // == Record Write ==
    /// Records a write without waiting for queue space.
    ///
    /// A write that does not fit is not lost: the pipeline is asked to
    /// reconcile its bookkeeping against the store on its next pass.
    pub fn record_write(&self, key: String, meta: EntryMeta) -> RecordOutcome {
        let outcome = self.offer(
            &self.writes,
            AccessEvent::Write {
                key,
                meta,
                completion: None,
            },
        );
        if outcome == RecordOutcome::Dropped {
            warn!("Write queue full, write bookkeeping deferred to reconcile");
            self.request_resync();
        }
        outcome
    }

    // == Record Tracked Write ==
    /// Records a write, waiting for queue space, and returns its token.
    pub async fn record_write_tracked(&self, key: String, meta: EntryMeta) -> Result<EventToken> {
        let (tx, rx) = oneshot::channel();
        let event = self.stamp(AccessEvent::Write {
            key,
            meta,
            completion: Some(tx),
        });
        self.writes
            .send_async(event)
            .await
            .map_err(|_| CacheError::Closed)?;
        Ok(EventToken { rx })
    }

    // == Record Read ==
    /// Records a read. Reads only refine recency, so a full read queue drops them.
    pub fn record_read(&self, key: &str) -> RecordOutcome {
        let outcome = self.offer(
            &self.reads,
            AccessEvent::Read {
                key: key.to_string(),
            },
        );
        if outcome == RecordOutcome::Dropped {
            trace!(key, "Read queue full, dropping recency touch");
        }
        outcome
    }

    // == Record Remove ==
    /// Records a caller removal. A dropped removal is healed by reconcile.
    pub fn record_remove(&self, key: String, generation: u64) -> RecordOutcome {
        let outcome = self.offer(&self.writes, AccessEvent::Remove { key, generation });
        if outcome == RecordOutcome::Dropped {
            self.request_resync();
        }
        outcome
    }

    /// Asks the pipeline to rebuild its bookkeeping from the store.
    pub fn request_resync(&self) {
        self.resync.store(true, Ordering::Release);
    }

    /// Returns true once the pipeline has stopped consuming.
    pub fn is_closed(&self) -> bool {
        self.writes.is_disconnected()
    }

    fn stamp(&self, event: AccessEvent) -> QueuedEvent {
        QueuedEvent {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            event,
        }
    }

    fn offer(&self, queue: &flume::Sender<QueuedEvent>, event: AccessEvent) -> RecordOutcome {
        match queue.try_send(self.stamp(event)) {
            Ok(()) => RecordOutcome::Queued,
            Err(TrySendError::Full(_)) => RecordOutcome::Dropped,
            Err(TrySendError::Disconnected(_)) => RecordOutcome::Closed,
        }
    }
}

// == Event Drain ==
/// Consumer side, owned by the maintenance pipeline.
#[derive(Debug)]
pub struct EventDrain {
    writes: flume::Receiver<QueuedEvent>,
    reads: flume::Receiver<QueuedEvent>,
    resync: Arc<AtomicBool>,
}

impl EventDrain {
    /// Waits for the next event from either queue, writes first. Returns None
    /// once every recorder is gone and both queues are empty.
    pub async fn next(&self) -> Option<QueuedEvent> {
        tokio::select! {
            biased;
            event = self.writes.recv_async() => event.ok().or_else(|| self.reads.try_recv().ok()),
            event = self.reads.recv_async() => event.ok().or_else(|| self.writes.try_recv().ok()),
        }
    }

    // == Drain ==
    /// Takes up to `max` queued events, `first` included, in submission order.
    ///
    /// Writes and removals claim the budget before reads.
    pub fn drain(&self, first: Option<QueuedEvent>, max: usize) -> Vec<AccessEvent> {
        let mut batch: Vec<QueuedEvent> = first.into_iter().collect();
        let budget = max.saturating_sub(batch.len());
        batch.extend(self.writes.try_iter().take(budget));
        let budget = max.saturating_sub(batch.len());
        batch.extend(self.reads.try_iter().take(budget));

        batch.sort_by_key(|queued| queued.seq);
        batch.into_iter().map(QueuedEvent::into_event).collect()
    }

    /// Clears and returns the resync request flag.
    pub fn take_resync(&self) -> bool {
        self.resync.swap(false, Ordering::AcqRel)
    }

    /// Number of queued events across both queues.
    pub fn pending(&self) -> usize {
        self.writes.len() + self.reads.len()
    }
}
