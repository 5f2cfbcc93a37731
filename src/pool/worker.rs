//! The download worker: private job queue, retry/failure state machine.
//!
//! One tokio task per worker for its whole lifetime. The task exits only by
//! consuming its own quit sentinel (or when every sender to its queue is
//! gone), at which point it removes its own registry entry. Nothing a plugin
//! returns can terminate the loop; every unclassified condition is converted
//! to a terminal `Failed` and the loop moves on.

use crate::config::Config;
use crate::file::DownloadFile;
use crate::hooks::HookManager;
use crate::persistence::PersistenceHandler;
use crate::plugin::{PluginFailure, PluginResult, REASON_OFFLINE, REASON_TEMP_OFFLINE, RetrievalPlugin};
use crate::types::{Event, FileId, Status, WorkerId};
use crate::utils::write_debug_report;

use super::reconnect::ReconnectSignal;

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc};

/// Message on a worker's private queue
pub(crate) enum WorkerJob {
    /// Process this file
    Process(Arc<DownloadFile>),
    /// Targeted shutdown sentinel for this worker only
    Quit,
}

/// Pool-side handle to a live worker
pub(crate) struct WorkerHandle {
    pub(crate) id: WorkerId,
    pub(crate) tx: mpsc::UnboundedSender<WorkerJob>,
    pub(crate) queued: Arc<AtomicUsize>,
    pub(crate) active: Arc<AtomicBool>,
    pub(crate) current: Arc<Mutex<Option<FileId>>>,
    pub(crate) join: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WorkerHandle {
    /// Routing weight: queue depth plus the job in flight, if any
    pub(crate) fn load(&self) -> usize {
        self.queued.load(Ordering::SeqCst) + usize::from(self.active.load(Ordering::SeqCst))
    }
}

pub(crate) type WorkerRegistry = Arc<Mutex<HashMap<WorkerId, WorkerHandle>>>;

/// Everything a worker task needs, cloned out of the pool at spawn time
pub(crate) struct WorkerContext {
    id: WorkerId,
    config: Arc<Config>,
    hooks: Arc<dyn HookManager>,
    persistence: Arc<dyn PersistenceHandler>,
    event_tx: broadcast::Sender<Event>,
    reconnecting: ReconnectSignal,
    registry: WorkerRegistry,
    tx: mpsc::UnboundedSender<WorkerJob>,
    queued: Arc<AtomicUsize>,
    active: Arc<AtomicBool>,
    current: Arc<Mutex<Option<FileId>>>,
}

/// Spawn a worker task and return the pool-side handle.
///
/// The caller inserts the handle into the registry; the worker removes the
/// entry itself when it consumes its quit sentinel.
pub(crate) fn spawn_worker(
    id: WorkerId,
    config: Arc<Config>,
    hooks: Arc<dyn HookManager>,
    persistence: Arc<dyn PersistenceHandler>,
    event_tx: broadcast::Sender<Event>,
    reconnecting: ReconnectSignal,
    registry: WorkerRegistry,
) -> WorkerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let queued = Arc::new(AtomicUsize::new(0));
    let active = Arc::new(AtomicBool::new(false));
    let current = Arc::new(Mutex::new(None));

    let ctx = WorkerContext {
        id,
        config,
        hooks,
        persistence,
        event_tx: event_tx.clone(),
        reconnecting,
        registry,
        tx: tx.clone(),
        queued: queued.clone(),
        active: active.clone(),
        current: current.clone(),
    };

    let join = tokio::spawn(ctx.run(rx));
    event_tx.send(Event::WorkerStarted { worker: id }).ok();

    WorkerHandle {
        id,
        tx,
        queued,
        active,
        current,
        join: Mutex::new(Some(join)),
    }
}

impl WorkerContext {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<WorkerJob>) {
        tracing::debug!(worker = self.id.0, "worker started");

        while let Some(job) = rx.recv().await {
            let file = match job {
                WorkerJob::Quit => break,
                WorkerJob::Process(file) => file,
            };
            self.queued.fetch_sub(1, Ordering::SeqCst);
            self.process(file).await;
        }

        self.deregister();
    }

    /// Drive one dequeued file through the retry/failure state machine.
    async fn process(&self, file: Arc<DownloadFile>) {
        let Some(plugin) = file.plugin() else {
            // plugin was detached while the file sat in the queue; the file
            // was deleted by the surrounding manager, so discard silently
            tracing::debug!(file_id = file.id().0, "file has no plugin, discarding");
            return;
        };

        self.active.store(true, Ordering::SeqCst);
        *lock(&self.current) = Some(file.id());

        let outcome = self.execute(&file, &plugin).await;
        let mut finished = false;

        match outcome {
            Ok(()) => {
                file.set_status(Status::Finished);
                tracing::info!(worker = self.id.0, name = %file.name(), "Download finished");
                self.hooks.download_finished(&file).await;
                if let Err(e) = self.persistence.check_package_finished(&file).await {
                    tracing::warn!(file_id = file.id().0, error = %e, "package check failed");
                }
                self.emit(Event::Finished {
                    id: file.id(),
                    name: file.name(),
                });
                finished = true;
            }

            Err(PluginFailure::CapabilityMissing) => {
                tracing::error!(
                    plugin = plugin.name(),
                    name = %file.name(),
                    "Plugin is missing a required function"
                );
                file.set_status(Status::Failed);
                file.set_error(Some("Plugin does not work".to_string()));
                self.emit_failed(&file);
                self.hooks.download_failed(&file).await;
                self.clean(&file, &plugin).await;
            }

            Err(PluginFailure::Abort) => {
                self.abort_file(&file, &plugin).await;
            }

            Err(PluginFailure::Reconnect) => {
                // the file goes straight back to this worker's queue; the
                // worker itself is what blocks on the reconnect signal
                self.requeue(file.clone());
                self.reconnecting.wait_until_clear().await;
            }

            Err(PluginFailure::Retry(reason)) => {
                tracing::info!(name = %file.name(), reason = %reason, "Download restarted");
                self.emit(Event::Restarted {
                    id: file.id(),
                    reason,
                });
                self.requeue(file.clone());
            }

            Err(PluginFailure::Fail(reason)) => {
                match reason.as_str() {
                    REASON_OFFLINE => {
                        file.set_status(Status::Offline);
                        tracing::warn!(name = %file.name(), "Download is offline");
                        self.emit(Event::Offline { id: file.id() });
                    }
                    REASON_TEMP_OFFLINE => {
                        file.set_status(Status::TempOffline);
                        tracing::warn!(name = %file.name(), "Download is temporarily offline");
                        self.emit(Event::TempOffline { id: file.id() });
                    }
                    _ => {
                        file.set_status(Status::Failed);
                        file.set_error(Some(reason.clone()));
                        tracing::warn!(name = %file.name(), reason = %reason, "Download failed");
                        self.emit_failed(&file);
                    }
                }
                self.hooks.download_failed(&file).await;
                self.clean(&file, &plugin).await;
            }

            Err(PluginFailure::Transport { code, message }) => {
                tracing::debug!(code, message = %message, "transport error");

                if self.config.is_transient_code(code) {
                    tracing::warn!(
                        name = %file.name(),
                        code,
                        "Couldn't connect to host or connection reset, waiting and retrying"
                    );
                    if self.wait_transient(&file).await {
                        self.abort_file(&file, &plugin).await;
                    } else {
                        self.requeue(file.clone());
                    }
                } else {
                    file.set_status(Status::Failed);
                    file.set_error(Some(format!("transport error {code}: {message}")));
                    tracing::error!(name = %file.name(), code, message = %message, "transport error");
                    self.dump_report(&file).await;
                    self.emit_failed(&file);
                    self.hooks.download_failed(&file).await;
                    self.clean(&file, &plugin).await;
                }
            }

            Err(PluginFailure::Skip(reason)) => {
                file.set_status(Status::Skipped);
                tracing::info!(name = %file.name(), reason = %reason, "Download skipped");
                self.emit(Event::Skipped {
                    id: file.id(),
                    reason,
                });
                self.clean(&file, &plugin).await;
                if let Err(e) = self.persistence.check_package_finished(&file).await {
                    tracing::warn!(file_id = file.id().0, error = %e, "package check failed");
                }
                if let Err(e) = self.persistence.flush().await {
                    tracing::warn!(error = %e, "persistence flush failed");
                }
            }

            Err(PluginFailure::Other(detail)) => {
                // defect path: anything unclassified ends here so the loop
                // stays alive
                file.set_status(Status::Failed);
                file.set_error(Some(detail.clone()));
                tracing::warn!(name = %file.name(), error = %detail, "Download failed");
                self.dump_report(&file).await;
                self.emit_failed(&file);
                self.hooks.download_failed(&file).await;
                self.clean(&file, &plugin).await;
            }
        }

        // every path, success or failure, ends with a flush and a
        // processed-state check
        if let Err(e) = self.persistence.flush().await {
            tracing::warn!(error = %e, "persistence flush failed");
        }
        if let Err(e) = self.persistence.check_if_processed(&file).await {
            tracing::warn!(file_id = file.id().0, error = %e, "processed check failed");
        }

        self.release();

        if finished {
            if let Err(e) = self.persistence.finish_if_done(&file).await {
                tracing::warn!(file_id = file.id().0, error = %e, "finish check failed");
            }
            if let Err(e) = self.persistence.flush().await {
                tracing::warn!(error = %e, "persistence flush failed");
            }
        }
    }

    /// Duplicate pre-check, preparing hook, then the plugin's retrieval.
    async fn execute(&self, file: &Arc<DownloadFile>, plugin: &Arc<dyn RetrievalPlugin>) -> PluginResult {
        file.set_status(Status::Running);
        plugin.check_for_same_files(file, true).await?;

        tracing::info!(worker = self.id.0, name = %file.name(), "Download starts");
        self.emit(Event::Started {
            id: file.id(),
            name: file.name(),
        });
        self.hooks.download_preparing(file).await;

        plugin.preprocess(file).await
    }

    /// Bounded backoff after a transient transport failure.
    ///
    /// Sets `wait_until` and `Waiting`, then sleeps in abort-poll-interval
    /// steps until the deadline. Returns true when the wait was cut short by
    /// an abort request.
    async fn wait_transient(&self, file: &Arc<DownloadFile>) -> bool {
        let backoff = self.config.worker.transient_backoff;
        let until = Utc::now()
            + chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::seconds(60));
        file.set_wait_until(Some(until));
        file.set_status(Status::Waiting);
        self.emit(Event::Waiting {
            id: file.id(),
            until,
        });

        let deadline = tokio::time::Instant::now() + backoff;
        let poll = self.config.worker.abort_poll_interval;
        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline || file.abort_requested() {
                break;
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }

        file.abort_requested()
    }

    async fn abort_file(&self, file: &Arc<DownloadFile>, plugin: &Arc<dyn RetrievalPlugin>) {
        file.set_status(Status::Aborted);
        tracing::info!(name = %file.name(), "Download aborted");
        self.emit(Event::Aborted { id: file.id() });
        self.clean(file, plugin).await;
    }

    /// Push the file back onto this worker's own queue tail.
    fn requeue(&self, file: Arc<DownloadFile>) {
        file.set_status(Status::Queued);
        self.queued.fetch_add(1, Ordering::SeqCst);
        // the receiver lives in this task, so the channel cannot be closed
        if self.tx.send(WorkerJob::Process(file)).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Release transfer-specific state after a terminal failure.
    async fn clean(&self, file: &Arc<DownloadFile>, plugin: &Arc<dyn RetrievalPlugin>) {
        plugin.clean(file).await;
        self.release();
    }

    fn release(&self) {
        self.active.store(false, Ordering::SeqCst);
        *lock(&self.current) = None;
    }

    async fn dump_report(&self, file: &Arc<DownloadFile>) {
        if !self.config.diagnostics.verbose {
            return;
        }
        match write_debug_report(&self.config.diagnostics.report_dir, file).await {
            Ok(path) => tracing::debug!(path = %path.display(), "wrote failure report"),
            Err(e) => tracing::warn!(error = %e, "failed to write failure report"),
        }
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    fn emit_failed(&self, file: &Arc<DownloadFile>) {
        self.emit(Event::Failed {
            id: file.id(),
            name: file.name(),
            error: file.error().unwrap_or_default(),
        });
    }

    /// Remove this worker's own registry entry; only called on loop exit.
    fn deregister(&self) {
        lock_registry(&self.registry).remove(&self.id);
        tracing::info!(worker = self.id.0, "worker stopped");
        self.emit(Event::WorkerStopped { worker: self.id });
    }
}

pub(crate) fn lock_registry(
    registry: &Mutex<HashMap<WorkerId, WorkerHandle>>,
) -> MutexGuard<'_, HashMap<WorkerId, WorkerHandle>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
