//! Error types for hoster-dl
//!
//! Classified plugin failures are not errors in this sense — they travel as
//! [`crate::plugin::PluginFailure`] and steer the worker state machine. The
//! variants here cover the engine's own operations (pool management,
//! configuration, I/O performed by bundled plugins and diagnostics).

use crate::types::WorkerId;
use thiserror::Error;

/// Result type alias for hoster-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hoster-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "transient_backoff")
        key: Option<String>,
    },

    /// A worker ID was not found in the pool registry
    #[error("worker {0} not found")]
    WorkerNotFound(WorkerId),

    /// The pool has no live workers to route a file to
    #[error("no workers available")]
    NoWorkers,

    /// The targeted worker's queue is closed (worker already stopped)
    #[error("worker {0} is no longer accepting jobs")]
    WorkerStopped(WorkerId),

    /// Persistence collaborator reported a failure
    #[error("persistence error: {0}")]
    Persistence(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new files
    #[error("shutdown in progress: not accepting new files")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}
