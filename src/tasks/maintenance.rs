//! Maintenance Task
//!
//! Background task that replays recorded accesses against the eviction and
//! expiration policy, then removes the entries the policy gives up.
//!
//! The task is the only owner of the policy state, so policy mutation is
//! serialized without locks. Each pass walks
//! `Idle -> Draining -> Applying -> Evicting -> Signaling -> Idle`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::cache::{
    AccessEvent, EntryStore, EventDrain, PolicyEngine, PolicyFault, QueuedEvent, RemovalCause,
};
use crate::config::CacheConfig;

// == Pipeline State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Draining,
    Applying,
    Evicting,
    Signaling,
    Stopped,
}

// == Batch Report ==
/// Outcome of one maintenance pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Events applied to the policy
    pub applied: usize,
    /// Events skipped after a fault
    pub skipped: usize,
    /// Entries removed because their deadline passed
    pub expired: usize,
    /// Entries removed by capacity pressure
    pub evicted: usize,
    /// Waiting writers released
    pub signaled: usize,
}

// == Maintenance ==
/// The maintenance pipeline: single consumer of the access queue.
pub struct Maintenance<V> {
    store: Arc<EntryStore<V>>,
    policy: PolicyEngine,
    drain: EventDrain,
    max_batch: usize,
    state: PipelineState,
}

impl<V> Maintenance<V> {
    pub fn new(store: Arc<EntryStore<V>>, drain: EventDrain, config: &CacheConfig) -> Self {
        Self {
            store,
            policy: PolicyEngine::new(config.capacity),
            drain,
            max_batch: config.max_batch.max(1),
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    // == Run Batch ==
    /// Runs one pass over at most `max_batch` events, `first` included.
    ///
    /// Completions are released only after eviction and expiry of the pass
    /// have been applied to the store.
    pub fn run_batch(&mut self, first: Option<QueuedEvent>) -> BatchReport {
        let mut report = BatchReport::default();

        self.transition(PipelineState::Draining);
        let events = self.drain.drain(first, self.max_batch);

        self.transition(PipelineState::Applying);
        if self.drain.take_resync() {
            self.reconcile();
        }

        let mut completions = Vec::new();
        let mut needs_resync = false;
        for mut event in events {
            if let AccessEvent::Write { completion, .. } = &mut event {
                completions.extend(completion.take());
            }
            let key = event.key().to_string();

            match panic::catch_unwind(AssertUnwindSafe(|| self.apply(event))) {
                Ok(Ok(())) => report.applied += 1,
                Ok(Err(fault)) => {
                    warn!(key = %key, %fault, "Skipping access event");
                    report.skipped += 1;
                    needs_resync = true;
                }
                Err(_) => {
                    error!(key = %key, "Panic while applying access event, skipping");
                    report.skipped += 1;
                    needs_resync = true;
                }
            }
        }
        if needs_resync {
            self.reconcile();
        }

        self.transition(PipelineState::Evicting);
        let now = Instant::now();
        // Expiry takes precedence over capacity eviction
        let mut victims = self.policy.expire_due(now);
        victims.extend(self.policy.evict_if_over_capacity(now));
        for victim in victims {
            if !self.store.remove_if_generation(&victim.key, victim.generation) {
                trace!(key = %victim.key, "Victim was rewritten, keeping it");
                continue;
            }
            match victim.cause {
                RemovalCause::Expired => report.expired += 1,
                RemovalCause::Evicted => report.evicted += 1,
            }
        }

        self.transition(PipelineState::Signaling);
        report.signaled = signal(completions);

        self.transition(PipelineState::Idle);
        if report.expired > 0 || report.evicted > 0 || report.skipped > 0 {
            debug!(
                "Maintenance pass: applied={}, skipped={}, expired={}, evicted={}, tracked={}",
                report.applied,
                report.skipped,
                report.expired,
                report.evicted,
                self.policy.len()
            );
        }
        report
    }

    // == Run ==
    /// Drives passes until shutdown is signalled or every recorder is gone.
    ///
    /// Wakes on new events, at the earliest tracked deadline, and on every
    /// `interval` tick so TTL expiry is enforced without traffic.
    pub async fn run(mut self, interval: Duration, shutdown: Arc<Notify>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Starting maintenance task with capacity {} and sweep interval {:?}",
            self.policy.capacity(),
            interval
        );

        loop {
            let next_deadline = self.policy.next_deadline();
            tokio::select! {
                biased;
                _ = shutdown.notified() => {
                    self.finish();
                    break;
                }
                event = self.drain.next() => match event {
                    Some(event) => {
                        self.run_batch(Some(event));
                    }
                    None => break,
                },
                _ = sleep_until_deadline(next_deadline) => {
                    self.run_batch(None);
                }
                _ = ticker.tick() => {
                    self.run_batch(None);
                }
            }
        }

        self.transition(PipelineState::Stopped);
        info!("Maintenance task stopped");
    }

    /// Applies everything still queued.
    fn finish(&mut self) {
        loop {
            self.run_batch(None);
            if self.drain.pending() == 0 {
                break;
            }
        }
    }

    fn apply(&mut self, event: AccessEvent) -> Result<(), PolicyFault> {
        match event {
            AccessEvent::Write { key, meta, .. } => match self.store.meta(&key) {
                Some(current) if current.generation == meta.generation => {
                    self.policy.on_insert(&key, meta)?;
                }
                // Superseded or already removed; a later event or reconcile covers it
                _ => trace!(key = %key, "Skipping superseded write"),
            },
            AccessEvent::Read { key } => self.policy.on_access(&key)?,
            AccessEvent::Remove { key, generation } => {
                self.policy.on_remove(&key, generation);
            }
        }
        Ok(())
    }

    fn reconcile(&mut self) {
        let report = self.policy.reconcile(self.store.snapshot());
        info!(
            "Reconciled policy with store: dropped={}, adopted={}",
            report.dropped, report.adopted
        );
    }

    fn transition(&mut self, next: PipelineState) {
        trace!("Maintenance {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

fn signal(completions: Vec<oneshot::Sender<()>>) -> usize {
    let count = completions.len();
    for tx in completions {
        // A waiter that timed out has dropped its receiver
        let _ = tx.send(());
    }
    count
}

/// Spawns the maintenance task for a cache.
///
/// # Arguments
/// * `store` - The entry store the policy removes from
/// * `drain` - Consumer side of the access queue
/// * `config` - Capacity, batch size and sweep interval
/// * `shutdown` - Notified to stop after draining pending events
///
/// # Returns
/// A JoinHandle that completes once the task reached `Stopped`.
pub fn spawn_maintenance_task<V>(
    store: Arc<EntryStore<V>>,
    drain: EventDrain,
    config: &CacheConfig,
    shutdown: Arc<Notify>,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    let maintenance = Maintenance::new(store, drain, config);
    tokio::spawn(maintenance.run(config.maintenance_interval, shutdown))
}
