//! Persistence layer contract.
//!
//! The surrounding file/package manager owns all durable state; the engine
//! only triggers it at defined points. `flush` is idempotent and safe to call
//! from any worker after every transition. Persistence failures are logged by
//! the worker and never interrupt the loop.

use crate::error::Result;
use crate::file::DownloadFile;
use async_trait::async_trait;

/// Persistence and completion-check callbacks invoked by workers
#[async_trait]
pub trait PersistenceHandler: Send + Sync {
    /// Flush pending state to durable storage (idempotent)
    async fn flush(&self) -> Result<()>;

    /// Check whether the file's package is now complete
    async fn check_package_finished(&self, file: &DownloadFile) -> Result<()>;

    /// Check whether this file is fully processed
    async fn check_if_processed(&self, file: &DownloadFile) -> Result<()>;

    /// Finalize the file if everything it was waiting on is done
    async fn finish_if_done(&self, file: &DownloadFile) -> Result<()>;
}

/// Persistence handler that does nothing; useful for tests and for embedders
/// that keep all state in memory.
pub struct NoOpPersistence;

#[async_trait]
impl PersistenceHandler for NoOpPersistence {
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn check_package_finished(&self, _file: &DownloadFile) -> Result<()> {
        Ok(())
    }

    async fn check_if_processed(&self, _file: &DownloadFile) -> Result<()> {
        Ok(())
    }

    async fn finish_if_done(&self, _file: &DownloadFile) -> Result<()> {
        Ok(())
    }
}
