//! File record status state machine.
//!
//! A record moves `uploaded → processing → {processed, failed}`. The only
//! edge out of a terminal state is the re-submission edge `failed → processing`.
//! Every writer finalizes a record through a conditional transition that is
//! applied only while the record is still in the expected state.

pub mod store;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use store::{ResultStore, StatusStore};

/// Processing status of a file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Uploaded => "uploaded",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Processed => "processed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Processed | ProcessingStatus::Failed)
    }

    /// States from which a record may legally move to `self`.
    pub fn predecessors(&self) -> &'static [ProcessingStatus] {
        match self {
            ProcessingStatus::Uploaded => &[],
            ProcessingStatus::Processing => {
                &[ProcessingStatus::Uploaded, ProcessingStatus::Failed]
            }
            ProcessingStatus::Processed | ProcessingStatus::Failed => {
                &[ProcessingStatus::Processing]
            }
        }
    }
}

/// Returns true when a record may move from `from` to `to`.
pub fn can_transition(from: ProcessingStatus, to: ProcessingStatus) -> bool {
    to.predecessors().contains(&from)
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown processing status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ProcessingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(ProcessingStatus::Uploaded),
            "processing" => Ok(ProcessingStatus::Processing),
            "processed" => Ok(ProcessingStatus::Processed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Unique address of a file record: partition key plus sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileKey {
    pub file_id: String,
    pub upload_timestamp: String,
}

impl FileKey {
    pub fn new(file_id: impl Into<String>, upload_timestamp: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            upload_timestamp: upload_timestamp.into(),
        }
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.file_id, self.upload_timestamp)
    }
}

/// One uploaded document and where it is in the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub key: FileKey,
    pub filename: Option<String>,
    pub processing_status: ProcessingStatus,
    pub batch_job_id: Option<String>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
    pub error_message: Option<String>,
    pub processing_duration_ms: Option<i64>,
}

impl FileRecord {
    /// A freshly uploaded record, as the upload collaborator creates it.
    pub fn uploaded(key: FileKey, filename: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            key,
            filename,
            processing_status: ProcessingStatus::Uploaded,
            batch_job_id: None,
            processing_started_at: None,
            processing_completed_at: None,
            failed_at: None,
            last_updated: now,
            error_message: None,
            processing_duration_ms: None,
        }
    }
}

/// A status change together with the timestamps it stamps on the record.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Start {
        started_at: DateTime<Utc>,
    },
    Complete {
        completed_at: DateTime<Utc>,
        duration_ms: Option<i64>,
    },
    Fail {
        failed_at: DateTime<Utc>,
        reason: String,
    },
}

impl Transition {
    pub fn target(&self) -> ProcessingStatus {
        match self {
            Transition::Start { .. } => ProcessingStatus::Processing,
            Transition::Complete { .. } => ProcessingStatus::Processed,
            Transition::Fail { .. } => ProcessingStatus::Failed,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Transition::Start { started_at } => *started_at,
            Transition::Complete { completed_at, .. } => *completed_at,
            Transition::Fail { failed_at, .. } => *failed_at,
        }
    }
}

/// Result of a conditional transition. `Skipped` is the expected outcome
/// when another writer finalized the record first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    Skipped { current: Option<ProcessingStatus> },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }
}
