use thiserror::Error;

use crate::analysis::JobNameError;
use crate::error::StoreError;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Malformed job name: {0}")]
    MalformedJobName(#[from] JobNameError),

    #[error("No file record found for file id '{file_id}'")]
    RecordNotFound { file_id: String },

    #[error("Dead-job timeout out of range: {0}")]
    TimeoutOutOfRange(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
