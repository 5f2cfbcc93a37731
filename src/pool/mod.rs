//! The worker pool: owns worker lifecycle, routes files, exposes the shared
//! reconnect signal.
//!
//! - [`reconnect`] - shared reconnect condition
//! - [`worker`] - per-worker loop and retry/failure state machine

pub mod reconnect;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use reconnect::ReconnectSignal;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::file::DownloadFile;
use crate::hooks::HookManager;
use crate::persistence::PersistenceHandler;
use crate::types::{Event, WorkerId};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;
use worker::{WorkerJob, WorkerRegistry, lock_registry, spawn_worker};

/// Pool of download workers.
///
/// Creates and retires workers, hands each incoming file to exactly one
/// worker's private queue, and carries the collaborators every worker shares:
/// the hook manager, the persistence handler, the event channel, and the
/// reconnect signal. Cloneable; all state is Arc-wrapped.
#[derive(Clone)]
pub struct DownloadPool {
    config: Arc<Config>,
    hooks: Arc<dyn HookManager>,
    persistence: Arc<dyn PersistenceHandler>,
    event_tx: broadcast::Sender<Event>,
    reconnecting: ReconnectSignal,
    workers: WorkerRegistry,
    next_worker_id: Arc<AtomicU64>,
    accepting_new: Arc<AtomicBool>,
}

impl DownloadPool {
    /// Create a pool and spawn `config.worker.initial_workers` workers.
    pub fn new(
        config: Config,
        hooks: Arc<dyn HookManager>,
        persistence: Arc<dyn PersistenceHandler>,
    ) -> Self {
        // Buffered so slow subscribers lag instead of blocking workers
        let (event_tx, _rx) = broadcast::channel(1000);

        let pool = Self {
            config: Arc::new(config),
            hooks,
            persistence,
            event_tx,
            reconnecting: ReconnectSignal::new(),
            workers: Arc::new(std::sync::Mutex::new(HashMap::new())),
            next_worker_id: Arc::new(AtomicU64::new(0)),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        for _ in 0..pool.config.worker.initial_workers {
            pool.add_worker();
        }

        pool
    }

    /// Subscribe to lifecycle events.
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls behind by more than the channel
    /// buffer receives a `Lagged` error rather than slowing workers down.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Spawn one more worker and return its id.
    pub fn add_worker(&self) -> WorkerId {
        let id = WorkerId(self.next_worker_id.fetch_add(1, Ordering::SeqCst));
        let handle = spawn_worker(
            id,
            self.config.clone(),
            self.hooks.clone(),
            self.persistence.clone(),
            self.event_tx.clone(),
            self.reconnecting.clone(),
            self.workers.clone(),
        );
        lock_registry(&self.workers).insert(id, handle);
        tracing::debug!(worker = id.0, "worker added to pool");
        id
    }

    /// IDs of the currently live workers
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        let mut ids: Vec<WorkerId> = lock_registry(&self.workers).keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of currently live workers
    pub fn worker_count(&self) -> usize {
        lock_registry(&self.workers).len()
    }

    /// Hand a file to the least-loaded worker's queue.
    ///
    /// The file is given to exactly one worker; retries stay pinned to that
    /// worker from then on.
    pub fn enqueue(&self, file: Arc<DownloadFile>) -> Result<WorkerId> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let registry = lock_registry(&self.workers);
        let handle = registry
            .values()
            .min_by_key(|h| (h.load(), h.id))
            .ok_or(Error::NoWorkers)?;
        Self::hand_to(handle, file.clone())?;
        let worker = handle.id;
        drop(registry);

        self.event_tx
            .send(Event::Queued {
                id: file.id(),
                worker,
            })
            .ok();
        Ok(worker)
    }

    /// Hand a file to a specific worker's queue.
    pub fn enqueue_to(&self, worker: WorkerId, file: Arc<DownloadFile>) -> Result<()> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let registry = lock_registry(&self.workers);
        let handle = registry.get(&worker).ok_or(Error::WorkerNotFound(worker))?;
        Self::hand_to(handle, file.clone())?;
        drop(registry);

        self.event_tx
            .send(Event::Queued {
                id: file.id(),
                worker,
            })
            .ok();
        Ok(())
    }

    fn hand_to(handle: &worker::WorkerHandle, file: Arc<DownloadFile>) -> Result<()> {
        handle.queued.fetch_add(1, Ordering::SeqCst);
        if handle.tx.send(WorkerJob::Process(file)).is_err() {
            handle.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::WorkerStopped(handle.id));
        }
        Ok(())
    }

    /// Retire one worker.
    ///
    /// Enqueues that worker's quit sentinel — a targeted shutdown, not a
    /// broadcast. The worker finishes or abandons its current dequeue wait,
    /// removes itself from the pool, and exits; other workers are unaffected.
    pub fn stop_worker(&self, worker: WorkerId) -> Result<()> {
        let registry = lock_registry(&self.workers);
        let handle = registry.get(&worker).ok_or(Error::WorkerNotFound(worker))?;
        handle
            .tx
            .send(WorkerJob::Quit)
            .map_err(|_| Error::WorkerStopped(worker))
    }

    /// Set or clear the shared reconnect condition.
    ///
    /// While set, any worker that hits the reconnect path blocks before
    /// dequeuing further work.
    pub fn set_reconnecting(&self, active: bool) {
        self.reconnecting.set(active);
        self.event_tx.send(Event::Reconnecting { active }).ok();
    }

    /// Whether a reconnect is currently in progress
    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.is_active()
    }

    /// Stop accepting files, retire every worker, and wait for their tasks.
    pub async fn shutdown(&self) {
        self.accepting_new.store(false, Ordering::SeqCst);

        let handles: Vec<_> = {
            let mut registry = lock_registry(&self.workers);
            registry.drain().map(|(_, h)| h).collect()
        };

        let mut joins = Vec::with_capacity(handles.len());
        for handle in &handles {
            handle.tx.send(WorkerJob::Quit).ok();
            if let Some(join) = handle
                .join
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take()
            {
                joins.push(join);
            }
        }

        // A worker blocked on the reconnect signal would never see its quit
        // sentinel; release it
        self.reconnecting.set(false);

        for result in futures::future::join_all(joins).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "worker task ended abnormally");
            }
        }

        self.event_tx.send(Event::Shutdown).ok();
        tracing::info!("download pool shut down");
    }
}
