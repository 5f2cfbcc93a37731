//! Shared test helpers for exercising the pool and worker state machine.

use crate::config::Config;
use crate::file::DownloadFile;
use crate::hooks::HookManager;
use crate::persistence::PersistenceHandler;
use crate::plugin::{PluginResult, RetrievalPlugin};
use crate::pool::DownloadPool;
use crate::types::{FileId, PackageId, Status};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Plugin that replays a scripted sequence of outcomes, one per
/// `preprocess` call. Outcomes past the end of the script succeed.
pub(crate) struct ScriptedPlugin {
    outcomes: Mutex<VecDeque<PluginResult>>,
    precheck: Mutex<VecDeque<PluginResult>>,
    delay: Option<Duration>,
    pub(crate) preprocess_calls: AtomicUsize,
    pub(crate) clean_calls: AtomicUsize,
    concurrent: AtomicUsize,
    pub(crate) max_concurrent: AtomicUsize,
}

impl ScriptedPlugin {
    pub(crate) fn new(outcomes: Vec<PluginResult>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            precheck: Mutex::new(VecDeque::new()),
            delay: None,
            preprocess_calls: AtomicUsize::new(0),
            clean_calls: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        })
    }

    /// Like `new` but every `preprocess` call sleeps for `delay` first.
    pub(crate) fn slow(outcomes: Vec<PluginResult>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            precheck: Mutex::new(VecDeque::new()),
            delay: Some(delay),
            preprocess_calls: AtomicUsize::new(0),
            clean_calls: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        })
    }

    /// Script the duplicate pre-check instead of the transfer.
    pub(crate) fn with_precheck(self: Arc<Self>, outcomes: Vec<PluginResult>) -> Arc<Self> {
        *self.precheck.lock().unwrap() = outcomes.into();
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.preprocess_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RetrievalPlugin for ScriptedPlugin {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn preprocess(&self, _file: &DownloadFile) -> PluginResult {
        self.preprocess_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()));
        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn check_for_same_files(&self, _file: &DownloadFile, _starting: bool) -> PluginResult {
        self.precheck.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn clean(&self, _file: &DownloadFile) {
        self.clean_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hook manager that counts invocations.
#[derive(Default)]
pub(crate) struct RecordingHooks {
    pub(crate) preparing: AtomicUsize,
    pub(crate) finished: AtomicUsize,
    pub(crate) failed: AtomicUsize,
}

#[async_trait]
impl HookManager for RecordingHooks {
    async fn download_preparing(&self, _file: &DownloadFile) {
        self.preparing.fetch_add(1, Ordering::SeqCst);
    }

    async fn download_finished(&self, _file: &DownloadFile) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    async fn download_failed(&self, _file: &DownloadFile) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Persistence handler that counts invocations and always succeeds.
#[derive(Default)]
pub(crate) struct RecordingPersistence {
    pub(crate) flushes: AtomicUsize,
    pub(crate) package_checks: AtomicUsize,
    pub(crate) processed_checks: AtomicUsize,
    pub(crate) finish_checks: AtomicUsize,
}

#[async_trait]
impl PersistenceHandler for RecordingPersistence {
    async fn flush(&self) -> crate::error::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn check_package_finished(&self, _file: &DownloadFile) -> crate::error::Result<()> {
        self.package_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn check_if_processed(&self, _file: &DownloadFile) -> crate::error::Result<()> {
        self.processed_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn finish_if_done(&self, _file: &DownloadFile) -> crate::error::Result<()> {
        self.finish_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct TestPool {
    pub(crate) pool: DownloadPool,
    pub(crate) hooks: Arc<RecordingHooks>,
    pub(crate) persistence: Arc<RecordingPersistence>,
}

/// Config with a single worker and short waits so backoff tests stay fast.
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.worker.initial_workers = 1;
    config.worker.transient_backoff = Duration::from_millis(150);
    config.worker.abort_poll_interval = Duration::from_millis(10);
    config
}

pub(crate) fn create_test_pool(config: Config) -> TestPool {
    let hooks = Arc::new(RecordingHooks::default());
    let persistence = Arc::new(RecordingPersistence::default());
    let pool = DownloadPool::new(config, hooks.clone(), persistence.clone());
    TestPool {
        pool,
        hooks,
        persistence,
    }
}

pub(crate) fn make_file(id: i64, plugin: Arc<dyn RetrievalPlugin>) -> Arc<DownloadFile> {
    let file = Arc::new(DownloadFile::new(
        FileId(id),
        PackageId(1),
        format!("http://example.com/file-{id}.bin"),
    ));
    file.attach_plugin(plugin);
    file
}

/// Poll until the file reaches `status`, panicking after `timeout`.
pub(crate) async fn wait_for_status(file: &Arc<DownloadFile>, status: Status, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while file.status() != status {
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "file {} never reached {status:?} (stuck at {:?})",
                file.id(),
                file.status()
            );
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll until `cond` holds, panicking with `msg` after `timeout`.
pub(crate) async fn wait_until<F: FnMut() -> bool>(mut cond: F, timeout: Duration, msg: &str) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out: {msg}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
