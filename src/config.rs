//! Configuration types for hoster-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Worker pool and retry behavior configuration
///
/// Groups the policy knobs of the job execution engine. The transient
/// transport code set and the backoff ceiling reproduce the legacy defaults;
/// they are configuration rather than hard invariants because no normative
/// source pins them down.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of workers spawned at pool construction (default: 3)
    #[serde(default = "default_initial_workers")]
    pub initial_workers: usize,

    /// Transport error codes considered likely to self-resolve on retry
    /// (default: 7, 18, 28, 52, 56 — curl code classes for connection
    /// refused/reset and timeouts)
    #[serde(default = "default_transient_codes")]
    pub transient_transport_codes: Vec<i32>,

    /// Backoff ceiling after a transient transport failure (default: 60 seconds)
    #[serde(default = "default_transient_backoff", with = "duration_serde")]
    pub transient_backoff: Duration,

    /// How often the backoff wait polls the abort flag (default: 1 second)
    #[serde(default = "default_abort_poll_interval", with = "duration_serde")]
    pub abort_poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            initial_workers: default_initial_workers(),
            transient_transport_codes: default_transient_codes(),
            transient_backoff: default_transient_backoff(),
            abort_poll_interval: default_abort_poll_interval(),
        }
    }
}

/// Download storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Download directory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
        }
    }
}

/// Fallback retrieval plugin configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Attempts per file before giving up with "No file downloaded" (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Diagnostics configuration
///
/// When `verbose` is set, terminal defect failures additionally write a small
/// report file for offline analysis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Write per-failure report files (default: false)
    #[serde(default)]
    pub verbose: bool,

    /// Directory for failure reports (default: "./reports")
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            report_dir: default_report_dir(),
        }
    }
}

/// Main configuration for the download pool
///
/// Sub-config fields are flattened for serialization, so the TOML/JSON format
/// stays a single flat table. All fields default, so `Config::default()`
/// works with zero configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Worker pool and retry policy
    #[serde(flatten)]
    pub worker: WorkerConfig,

    /// Storage locations
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Fallback retrieval plugin behavior
    #[serde(flatten)]
    pub retrieval: RetrievalConfig,

    /// Failure diagnostics
    #[serde(flatten)]
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Whether the given transport code is in the transient class
    pub fn is_transient_code(&self, code: i32) -> bool {
        self.worker.transient_transport_codes.contains(&code)
    }
}

fn default_initial_workers() -> usize {
    3
}

fn default_transient_codes() -> Vec<i32> {
    vec![7, 18, 28, 52, 56]
}

fn default_transient_backoff() -> Duration {
    Duration::from_secs(60)
}

fn default_abort_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_attempts() -> u32 {
    5
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("./reports")
}

// Duration serialization helper (seconds as integer)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_legacy_policy() {
        let config = Config::default();
        assert_eq!(config.worker.initial_workers, 3);
        assert_eq!(config.worker.transient_transport_codes, vec![7, 18, 28, 52, 56]);
        assert_eq!(config.worker.transient_backoff, Duration::from_secs(60));
        assert_eq!(config.worker.abort_poll_interval, Duration::from_secs(1));
        assert_eq!(config.retrieval.max_attempts, 5);
        assert!(!config.diagnostics.verbose);
    }

    #[test]
    fn is_transient_code_checks_configured_set() {
        let config = Config::default();
        for code in [7, 18, 28, 52, 56] {
            assert!(config.is_transient_code(code), "{code} should be transient");
        }
        assert!(!config.is_transient_code(0));
        assert!(!config.is_transient_code(22));
    }

    #[test]
    fn config_deserializes_from_flat_json_with_defaults() {
        let config: Config = serde_json::from_str(r#"{"transient_backoff": 5}"#).unwrap();
        assert_eq!(
            config.worker.transient_backoff,
            Duration::from_secs(5),
            "explicit field should override the default"
        );
        assert_eq!(
            config.worker.initial_workers, 3,
            "unspecified fields should keep their defaults"
        );
    }

    #[test]
    fn config_serializes_durations_as_seconds() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["transient_backoff"], 60);
        assert_eq!(json["abort_poll_interval"], 1);
    }
}
