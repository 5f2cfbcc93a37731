//! # hoster-dl
//!
//! Plugin-driven download manager engine. A pool of workers pulls download
//! jobs from per-worker queues, invokes site-specific retrieval plugins, and
//! drives each job through a status lifecycle with fine-grained retry,
//! backoff, reconnect, and cancellation semantics.
//!
//! ## Design Philosophy
//!
//! - **Engine, not application** - retrieval plugins, accounts, and
//!   persistence are trait contracts the embedder provides
//! - **Classified failures** - plugins return a tagged outcome; an explicit
//!   state machine in the worker decides retry, backoff, or terminal status
//! - **Loop liveness** - nothing a plugin returns can kill a worker; a worker
//!   exits only via its own quit sentinel
//! - **Event-driven** - consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use hoster_dl::{
//!     BasePlugin, Config, DownloadFile, DownloadPool, FileId, NoAuth, NoOpHooks,
//!     NoOpPersistence, PackageId,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = DownloadPool::new(
//!         Config::default(),
//!         Arc::new(NoOpHooks),
//!         Arc::new(NoOpPersistence),
//!     );
//!
//!     // Subscribe to events
//!     let mut events = pool.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let file = Arc::new(DownloadFile::new(
//!         FileId(1),
//!         PackageId(1),
//!         "https://example.com/archive.zip",
//!     ));
//!     file.attach_plugin(Arc::new(BasePlugin::new(pool.config(), Arc::new(NoAuth))));
//!     pool.enqueue(file)?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Account/credential lookup contract
pub mod auth;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// The download file (job) data model
pub mod file;
/// Hook notification contract
pub mod hooks;
/// Persistence layer contract
pub mod persistence;
/// Retrieval plugin contract and bundled fallback plugin
pub mod plugin;
/// Worker pool and job execution engine
pub mod pool;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use auth::{AuthProvider, Credentials, NoAuth, StaticAuthProvider};
pub use config::Config;
pub use error::{Error, Result};
pub use file::DownloadFile;
pub use hooks::{HookManager, NoOpHooks};
pub use persistence::{NoOpPersistence, PersistenceHandler};
pub use plugin::{BasePlugin, PluginFailure, PluginResult, RetrievalPlugin};
pub use pool::{DownloadPool, ReconnectSignal};
pub use types::{Event, FileId, PackageId, Status, WorkerId};

/// Helper function to run the pool with graceful signal handling.
///
/// Waits for a termination signal and then calls the pool's `shutdown()`.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(pool: DownloadPool) {
    wait_for_signal().await;
    pool.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
