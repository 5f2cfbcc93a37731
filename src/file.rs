//! The unit of work: one URL/file tracked through its status lifecycle.

use crate::plugin::RetrievalPlugin;
use crate::types::{FileId, PackageId, Status};
use crate::utils::name_from_url;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// One download job.
///
/// Mutable fields are touched only by the worker currently holding the file,
/// with one deliberate exception: `abort` may be set from any thread at any
/// time and is polled by the owning worker at its suspension points. This
/// makes cancellation best-effort with bounded latency, never preemptive.
///
/// The attached plugin may be detached while the file sits in a queue (the
/// file was deleted by the surrounding manager); the worker then discards the
/// job silently.
pub struct DownloadFile {
    id: FileId,
    package: PackageId,
    url: String,
    name: Mutex<String>,
    status: Mutex<Status>,
    error: Mutex<Option<String>>,
    wait_until: Mutex<Option<DateTime<Utc>>>,
    abort: AtomicBool,
    plugin: Mutex<Option<Arc<dyn RetrievalPlugin>>>,
}

impl DownloadFile {
    /// Create a new file in `Queued` state; the name is derived from the URL
    /// until a plugin sets a better one.
    pub fn new(id: FileId, package: PackageId, url: impl Into<String>) -> Self {
        let url = url.into();
        let name = name_from_url(&url);
        Self {
            id,
            package,
            url,
            name: Mutex::new(name),
            status: Mutex::new(Status::Queued),
            error: Mutex::new(None),
            wait_until: Mutex::new(None),
            abort: AtomicBool::new(false),
            plugin: Mutex::new(None),
        }
    }

    /// File ID
    pub fn id(&self) -> FileId {
        self.id
    }

    /// Containing package ID (reference only; the file does not own the package)
    pub fn package(&self) -> PackageId {
        self.package
    }

    /// Source URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current display name
    pub fn name(&self) -> String {
        lock(&self.name).clone()
    }

    /// Replace the display name (plugins set this once they know better)
    pub fn set_name(&self, name: impl Into<String>) {
        *lock(&self.name) = name.into();
    }

    /// Current status
    pub fn status(&self) -> Status {
        *lock(&self.status)
    }

    /// Set the status
    pub fn set_status(&self, status: Status) {
        tracing::trace!(file_id = self.id.0, status = %status, "status change");
        *lock(&self.status) = status;
    }

    /// Diagnostic reason recorded on terminal failure
    pub fn error(&self) -> Option<String> {
        lock(&self.error).clone()
    }

    /// Record (or clear) the terminal failure reason
    pub fn set_error(&self, error: Option<String>) {
        *lock(&self.error) = error;
    }

    /// Deadline of the current backoff wait, if any
    pub fn wait_until(&self) -> Option<DateTime<Utc>> {
        *lock(&self.wait_until)
    }

    /// Set the backoff deadline
    pub fn set_wait_until(&self, until: Option<DateTime<Utc>>) {
        *lock(&self.wait_until) = until;
    }

    /// Request cooperative cancellation.
    ///
    /// Safe to call from any thread; takes effect at the worker's next poll
    /// point (queue dequeue, backoff tick, plugin-defined checkpoints).
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Attach the retrieval plugin responsible for this file
    pub fn attach_plugin(&self, plugin: Arc<dyn RetrievalPlugin>) {
        *lock(&self.plugin) = Some(plugin);
    }

    /// Detach the plugin; a queued file without a plugin is discarded silently
    pub fn detach_plugin(&self) {
        *lock(&self.plugin) = None;
    }

    /// Whether a usable plugin is attached
    pub fn has_plugin(&self) -> bool {
        lock(&self.plugin).is_some()
    }

    /// The attached plugin, if any
    pub fn plugin(&self) -> Option<Arc<dyn RetrievalPlugin>> {
        lock(&self.plugin).clone()
    }
}

impl std::fmt::Debug for DownloadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadFile")
            .field("id", &self.id)
            .field("package", &self.package)
            .field("url", &self.url)
            .field("name", &self.name())
            .field("status", &self.status())
            .field("error", &self.error())
            .finish_non_exhaustive()
    }
}

// Guards are never held across awaits; a poisoned lock only means a test
// panicked mid-mutation, so recover the inner value instead of propagating.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{PluginResult, RetrievalPlugin};
    use async_trait::async_trait;

    struct DummyPlugin;

    #[async_trait]
    impl RetrievalPlugin for DummyPlugin {
        fn name(&self) -> &str {
            "dummy"
        }

        async fn preprocess(&self, _file: &DownloadFile) -> PluginResult {
            Ok(())
        }
    }

    #[test]
    fn new_file_starts_queued_with_derived_name() {
        let file = DownloadFile::new(FileId(1), PackageId(1), "http://example.com/a/b.rar");
        assert_eq!(file.status(), Status::Queued);
        assert_eq!(file.name(), "b.rar");
        assert_eq!(file.error(), None);
        assert!(!file.abort_requested());
    }

    #[test]
    fn abort_flag_is_sticky_and_thread_safe() {
        let file = Arc::new(DownloadFile::new(FileId(1), PackageId(1), "http://x/f"));
        let clone = file.clone();
        let handle = std::thread::spawn(move || clone.request_abort());
        handle.join().unwrap();
        assert!(file.abort_requested());
    }

    #[test]
    fn plugin_slot_attach_detach() {
        let file = DownloadFile::new(FileId(1), PackageId(1), "http://x/f");
        assert!(!file.has_plugin());

        file.attach_plugin(Arc::new(DummyPlugin));
        assert!(file.has_plugin());
        assert_eq!(file.plugin().unwrap().name(), "dummy");

        file.detach_plugin();
        assert!(!file.has_plugin());
        assert!(file.plugin().is_none());
    }

    #[test]
    fn set_name_overrides_derived_name() {
        let file = DownloadFile::new(FileId(1), PackageId(1), "http://x/raw");
        file.set_name("pretty.bin");
        assert_eq!(file.name(), "pretty.bin");
    }
}
