//! Retrieval plugin contract and classified failure outcomes.
//!
//! Site-specific retrieval logic lives behind [`RetrievalPlugin`]. A plugin
//! does whatever scraping or redirect resolution it needs and either returns
//! success or a [`PluginFailure`] that steers the worker's retry/failure
//! state machine. The engine never interprets anything beyond this enum.

mod base;

pub use base::BasePlugin;

use crate::file::DownloadFile;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Canonical fail reason for a file the source reports as gone
pub const REASON_OFFLINE: &str = "offline";

/// Canonical fail reason for a file that is temporarily unavailable
pub const REASON_TEMP_OFFLINE: &str = "temp. offline";

/// Classified failure raised by a retrieval plugin.
///
/// Each variant maps to exactly one action in the worker state machine; see
/// the worker module for the full table.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PluginFailure {
    /// The plugin lacks a required capability for this file — always
    /// terminal, logged as a plugin defect, never retried
    #[error("plugin is missing a required capability")]
    CapabilityMissing,

    /// Cooperative cancellation observed mid-transfer
    #[error("aborted")]
    Abort,

    /// A network reconnect is required before this file can proceed
    #[error("reconnect requested")]
    Reconnect,

    /// Retry immediately; the reason is logged, never stored as terminal error
    #[error("retry: {0}")]
    Retry(String),

    /// Terminal classified failure ("offline", "temp. offline", or free-form)
    #[error("{0}")]
    Fail(String),

    /// The file is redundant (duplicate detection)
    #[error("skipped: {0}")]
    Skip(String),

    /// Transport-layer failure with a curl-class error code
    #[error("transport error {code}: {message}")]
    Transport {
        /// curl-compatible error code (7 = connect, 28 = timeout, ...)
        code: i32,
        /// Low-level error message
        message: String,
    },

    /// Anything the plugin could not classify; handled by the defect path
    #[error("{0}")]
    Other(String),
}

impl PluginFailure {
    /// `Fail("offline")`
    pub fn offline() -> Self {
        Self::Fail(REASON_OFFLINE.to_string())
    }

    /// `Fail("temp. offline")`
    pub fn temp_offline() -> Self {
        Self::Fail(REASON_TEMP_OFFLINE.to_string())
    }

    /// Generic terminal failure with a human-readable reason
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }

    /// Immediate retry with a logged reason
    pub fn retry(reason: impl Into<String>) -> Self {
        Self::Retry(reason.into())
    }

    /// Skip as redundant
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip(reason.into())
    }
}

/// Outcome of a plugin invocation
pub type PluginResult = std::result::Result<(), PluginFailure>;

/// Site-specific retrieval logic.
///
/// `preprocess` performs the actual transfer for one file and is invoked by
/// exactly one worker at a time. Implementations should poll
/// [`DownloadFile::abort_requested`] at their own checkpoints and return
/// [`PluginFailure::Abort`] when set.
#[async_trait]
pub trait RetrievalPlugin: Send + Sync {
    /// Plugin name for logging
    fn name(&self) -> &str;

    /// Run the retrieval for this file
    async fn preprocess(&self, file: &DownloadFile) -> PluginResult;

    /// Duplicate-file pre-check; may raise [`PluginFailure::Skip`].
    ///
    /// `starting` is true for the check run before the transfer begins.
    async fn check_for_same_files(&self, _file: &DownloadFile, _starting: bool) -> PluginResult {
        Ok(())
    }

    /// Release transfer-specific session state (auth handles, cookies).
    ///
    /// Called by the worker when the file reaches a terminal failure.
    async fn clean(&self, _file: &DownloadFile) {}
}

static HTML_DOC: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\A\s*<!DOCTYPE html").expect("static regex")
});

static HTML_ERROR: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\A\s*(<.+>)?\d{3}(\z|\s)").expect("static regex")
});

/// Post-download integrity classifier.
///
/// A successful transfer can still be a disguised failure: an empty body, an
/// HTML document where a binary was expected, or a bare 3-digit status code.
/// Returns the lowercase failure kind, which plugins convert to
/// `Fail(capitalized kind)` so the file ends `Failed` instead of `Finished`.
pub fn classify_download(body: &[u8]) -> Option<&'static str> {
    let text = String::from_utf8_lossy(&body[..body.len().min(1024)]);

    if text.trim().is_empty() {
        return Some("empty file");
    }
    if HTML_DOC.is_match(&text) {
        return Some("html file");
    }
    if HTML_ERROR.is_match(&text) {
        return Some("html error");
    }

    None
}
