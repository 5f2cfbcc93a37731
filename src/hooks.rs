//! Hook notifications fired around download processing.
//!
//! Fire-and-forget: no return value is consumed and failures inside a hook
//! are the hook's own concern. The broadcast [`crate::types::Event`] channel
//! on the pool is the second, always-on observation surface; this trait
//! exists for collaborators that want direct calls instead of a subscription.

use crate::file::DownloadFile;
use async_trait::async_trait;

/// Add-on notification hooks
#[async_trait]
pub trait HookManager: Send + Sync {
    /// A worker is about to invoke the retrieval plugin for this file
    async fn download_preparing(&self, file: &DownloadFile);

    /// The file finished successfully
    async fn download_finished(&self, file: &DownloadFile);

    /// The file failed terminally (not fired for aborts or skips)
    async fn download_failed(&self, file: &DownloadFile);
}

/// Hook manager that does nothing
pub struct NoOpHooks;

#[async_trait]
impl HookManager for NoOpHooks {
    async fn download_preparing(&self, _file: &DownloadFile) {}

    async fn download_finished(&self, _file: &DownloadFile) {}

    async fn download_failed(&self, _file: &DownloadFile) {}
}
