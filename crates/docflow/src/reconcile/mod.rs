//! Out-of-band finalization of file records.
//!
//! Two writers converge records that the pipeline did not finish itself:
//! the [`JobCompletionReconciler`] reacts to job-completion events, and the
//! [`DeadJobDetector`] sweeps records stuck in `processing`. Both finalize
//! through the store's conditional transition, so for any record at most one
//! of them (or the pipeline) ever wins.

pub mod dead_jobs;
pub mod error;
pub mod scheduler;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::JobName;
use crate::status::{FileRecord, ProcessingStatus, StatusStore, Transition, TransitionOutcome};

pub use dead_jobs::{DeadJobDetector, SweepReport, PROCESSING_TIMEOUT_REASON};
pub use error::ReconcileError;
pub use scheduler::SweepScheduler;

/// Reason recorded when a FAILED event carries none.
pub const DEFAULT_FAILURE_REASON: &str = "Analysis job failed";

/// "Job state changed" notification from the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCompletionEvent {
    #[serde(alias = "JobId")]
    pub job_id: String,
    /// The job tag given at submission.
    #[serde(alias = "JobTag")]
    pub job_name: String,
    #[serde(alias = "Status")]
    pub job_status: String,
    #[serde(default, alias = "StatusMessage")]
    pub status_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record moved to this terminal status.
    Applied(ProcessingStatus),
    /// The record was no longer `processing`; nothing changed.
    AlreadyTerminal(Option<ProcessingStatus>),
    /// Unrecognized job status; nothing changed.
    Ignored(String),
}

pub struct JobCompletionReconciler {
    store: Arc<dyn StatusStore>,
}

impl JobCompletionReconciler {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    pub fn reconcile(&self, event: &JobCompletionEvent) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconcile_at(event, Utc::now())
    }

    /// Applies `event` as of `now`. Duplicate and out-of-order events are
    /// no-ops.
    pub fn reconcile_at(
        &self,
        event: &JobCompletionEvent,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let job_name = JobName::parse(&event.job_name)?;
        let file_id = job_name.file_id();

        let succeeded = match event.job_status.as_str() {
            "SUCCEEDED" => true,
            "FAILED" => false,
            other => {
                info!(
                    "Ignoring job {} with status {} for file {}",
                    event.job_id, other, file_id
                );
                return Ok(ReconcileOutcome::Ignored(other.to_string()));
            }
        };

        let record = self.locate(file_id, &event.job_id)?;
        let transition = if succeeded {
            Transition::Complete {
                completed_at: now,
                duration_ms: record
                    .processing_started_at
                    .map(|started| (now - started).num_milliseconds().max(0)),
            }
        } else {
            Transition::Fail {
                failed_at: now,
                reason: event
                    .status_reason
                    .clone()
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()),
            }
        };
        let target = transition.target();

        match self
            .store
            .compare_and_swap(&record.key, ProcessingStatus::Processing, &transition)?
        {
            TransitionOutcome::Applied => {
                info!(
                    "Job {} finalized {} as {}",
                    event.job_id, record.key, target
                );
                Ok(ReconcileOutcome::Applied(target))
            }
            TransitionOutcome::Skipped { current } => {
                debug!(
                    "Job {}: {} already left processing ({:?}), no change",
                    event.job_id, record.key, current
                );
                Ok(ReconcileOutcome::AlreadyTerminal(current))
            }
        }
    }

    /// Events carry only the file id. Prefer the upload this job was
    /// attached to, else the newest upload.
    fn locate(&self, file_id: &str, job_id: &str) -> Result<FileRecord, ReconcileError> {
        let mut records = self.store.find_by_file_id(file_id)?;
        if records.is_empty() {
            return Err(ReconcileError::RecordNotFound {
                file_id: file_id.to_string(),
            });
        }

        if let Some(pos) = records
            .iter()
            .position(|r| r.batch_job_id.as_deref() == Some(job_id))
        {
            return Ok(records.swap_remove(pos));
        }

        if records.len() > 1 {
            warn!(
                "{} uploads for file {} and none attached to job {}; using newest",
                records.len(),
                file_id,
                job_id
            );
        }
        Ok(records.swap_remove(0))
    }
}
