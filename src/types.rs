//! Core types for hoster-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a download file (one job)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub i64);

impl FileId {
    /// Create a new FileId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for FileId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<FileId> for i64 {
    fn from(id: FileId) -> Self {
        id.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for FileId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Identifier of the package a file belongs to.
///
/// The engine never owns or inspects the package; the id exists only so the
/// persistence layer can run its package-completion check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(pub i64);

impl PackageId {
    /// Create a new PackageId
    pub fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a download worker
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u64);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File status
///
/// Integer codes match the legacy status map so persisted records stay
/// readable across implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting in a worker queue
    Queued,
    /// Currently being processed by a worker
    Running,
    /// Backing off after a transient transport failure
    Waiting,
    /// Cancelled cooperatively
    Aborted,
    /// Source reports the file as gone
    Offline,
    /// Source reports the file as temporarily unavailable
    TempOffline,
    /// Redundant (duplicate-file detection)
    Skipped,
    /// Failed with error
    Failed,
    /// Successfully retrieved
    Finished,
}

impl Status {
    /// Convert integer status code to Status enum
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => Status::Finished,
            1 => Status::Offline,
            3 => Status::Queued,
            4 => Status::Skipped,
            5 => Status::Waiting,
            6 => Status::TempOffline,
            8 => Status::Failed,
            9 => Status::Aborted,
            12 => Status::Running,
            _ => Status::Failed, // Default to Failed for unknown status
        }
    }

    /// Convert Status enum to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            Status::Finished => 0,
            Status::Offline => 1,
            Status::Queued => 3,
            Status::Skipped => 4,
            Status::Waiting => 5,
            Status::TempOffline => 6,
            Status::Failed => 8,
            Status::Aborted => 9,
            Status::Running => 12,
        }
    }

    /// Whether no further automatic transition occurs from this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Aborted
                | Status::Offline
                | Status::TempOffline
                | Status::Skipped
                | Status::Failed
                | Status::Finished
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Queued => "queued",
            Status::Running => "running",
            Status::Waiting => "waiting",
            Status::Aborted => "aborted",
            Status::Offline => "offline",
            Status::TempOffline => "temp. offline",
            Status::Skipped => "skipped",
            Status::Failed => "failed",
            Status::Finished => "finished",
        };
        write!(f, "{s}")
    }
}

/// Event emitted during the download lifecycle
///
/// Events are broadcast to all subscribers and carry enough context for a UI
/// or logging layer without coupling it to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// File handed to a worker queue
    Queued {
        /// File ID
        id: FileId,
        /// Worker the file was routed to
        worker: WorkerId,
    },

    /// Worker dequeued the file and started plugin processing
    Started {
        /// File ID
        id: FileId,
        /// File name
        name: String,
    },

    /// File entered transient-failure backoff
    Waiting {
        /// File ID
        id: FileId,
        /// Deadline after which the file is re-queued
        until: DateTime<Utc>,
    },

    /// File was re-queued after an explicit retry
    Restarted {
        /// File ID
        id: FileId,
        /// Retry reason reported by the plugin
        reason: String,
    },

    /// File retrieved successfully
    Finished {
        /// File ID
        id: FileId,
        /// File name
        name: String,
    },

    /// File failed terminally
    Failed {
        /// File ID
        id: FileId,
        /// File name
        name: String,
        /// Error message
        error: String,
    },

    /// File cancelled cooperatively
    Aborted {
        /// File ID
        id: FileId,
    },

    /// File skipped as redundant
    Skipped {
        /// File ID
        id: FileId,
        /// Skip reason reported by the plugin
        reason: String,
    },

    /// Source reports the file as gone
    Offline {
        /// File ID
        id: FileId,
    },

    /// Source reports the file as temporarily unavailable
    TempOffline {
        /// File ID
        id: FileId,
    },

    /// Shared reconnect condition changed
    Reconnecting {
        /// Whether a reconnect is now in progress
        active: bool,
    },

    /// A worker was added to the pool
    WorkerStarted {
        /// Worker ID
        worker: WorkerId,
    },

    /// A worker consumed its quit sentinel and left the pool
    WorkerStopped {
        /// Worker ID
        worker: WorkerId,
    },

    /// Graceful shutdown initiated
    Shutdown,
}
