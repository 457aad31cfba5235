//! Storage seams for file records and processing results.
//!
//! Any backend can satisfy [`StatusStore`] as long as `compare_and_swap`
//! is atomic with respect to other writers: "update status to X only if
//! status currently equals Y". The SQLite [`Database`] is the bundled backend.

use chrono::{DateTime, Utc};

use super::{can_transition, FileKey, FileRecord, ProcessingStatus, Transition, TransitionOutcome};
use crate::db::{file_repo, result_repo, Database};
use crate::error::StoreError;
use crate::pipeline::ProcessingResult;

pub trait StatusStore: Send + Sync {
    fn get(&self, key: &FileKey) -> Result<Option<FileRecord>, StoreError>;

    /// All records for a file id, newest upload first.
    fn find_by_file_id(&self, file_id: &str) -> Result<Vec<FileRecord>, StoreError>;

    /// Applies `transition` only if the record is currently in `expected`.
    fn compare_and_swap(
        &self,
        key: &FileKey,
        expected: ProcessingStatus,
        transition: &Transition,
    ) -> Result<TransitionOutcome, StoreError>;

    /// Associates the external job id with a record that is still processing.
    /// Returns false when the record already left `processing`.
    fn attach_job_id(
        &self,
        key: &FileKey,
        job_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Records in `processing` whose `processing_started_at` is before `cutoff`.
    fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<FileRecord>, StoreError>;

    fn latest_for_file(&self, file_id: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.find_by_file_id(file_id)?.into_iter().next())
    }
}

pub trait ResultStore: Send + Sync {
    fn put_result(&self, file_id: &str, result: &ProcessingResult) -> Result<(), StoreError>;

    fn get_result(&self, file_id: &str) -> Result<Option<ProcessingResult>, StoreError>;
}

impl StatusStore for Database {
    fn get(&self, key: &FileKey) -> Result<Option<FileRecord>, StoreError> {
        Ok(file_repo::find_by_key(self, key)?)
    }

    fn find_by_file_id(&self, file_id: &str) -> Result<Vec<FileRecord>, StoreError> {
        Ok(file_repo::find_by_file_id(self, file_id)?)
    }

    fn compare_and_swap(
        &self,
        key: &FileKey,
        expected: ProcessingStatus,
        transition: &Transition,
    ) -> Result<TransitionOutcome, StoreError> {
        let target = transition.target();
        if !can_transition(expected, target) {
            return Err(StoreError::InvalidTransition {
                from: expected,
                to: target,
            });
        }

        if file_repo::conditional_transition(self, key, expected, transition)? {
            return Ok(TransitionOutcome::Applied);
        }

        let current = file_repo::find_by_key(self, key)?.map(|r| r.processing_status);
        Ok(TransitionOutcome::Skipped { current })
    }

    fn attach_job_id(
        &self,
        key: &FileKey,
        job_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(file_repo::attach_job_id(self, key, job_id, at)?)
    }

    fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<FileRecord>, StoreError> {
        Ok(file_repo::find_stale_processing(self, cutoff)?)
    }
}

impl ResultStore for Database {
    fn put_result(&self, file_id: &str, result: &ProcessingResult) -> Result<(), StoreError> {
        let json = serde_json::to_string(result)?;
        result_repo::upsert(self, file_id, &json, Utc::now())?;
        Ok(())
    }

    fn get_result(&self, file_id: &str) -> Result<Option<ProcessingResult>, StoreError> {
        match result_repo::find_json(self, file_id)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
