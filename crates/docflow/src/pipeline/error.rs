use thiserror::Error;

use crate::analysis::JobNameError;
use crate::error::{AnalysisError, ServiceError, StoreError};
use crate::status::{FileKey, ProcessingStatus};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid work item: {0}")]
    InvalidWorkItem(String),

    #[error("Work item targets '{actual}', but this pipeline writes to '{expected}'")]
    UnknownDestination { expected: String, actual: String },

    #[error("No file record found for file id '{file_id}'")]
    RecordNotFound { file_id: String },

    #[error("File record {0} is already processing")]
    AlreadyProcessing(FileKey),

    #[error("File record {key} cannot be processed from state {status}")]
    NotStartable {
        key: FileKey,
        status: ProcessingStatus,
    },

    #[error("File record {key} was finalized concurrently as {current}")]
    FinalizedConcurrently { key: FileKey, current: String },

    #[error("Job name error: {0}")]
    JobName(#[from] JobNameError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to build service client: {0}")]
    Client(#[from] ServiceError),
}

impl PipelineError {
    /// Errors raised before the record was moved to `processing`.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidWorkItem(_)
                | PipelineError::UnknownDestination { .. }
                | PipelineError::RecordNotFound { .. }
                | PipelineError::AlreadyProcessing(_)
                | PipelineError::NotStartable { .. }
        )
    }
}
