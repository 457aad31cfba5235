use serde::{Deserialize, Serialize};

use crate::analysis::DocumentLocation;
use crate::status::{FileKey, ProcessingStatus};

/// A request to process one stored document into one status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    #[serde(default = "new_item_id")]
    pub id: String,
    pub bucket: String,
    pub key: String,
    pub file_id: String,
    #[serde(alias = "destinationTableRef")]
    pub destination_table: String,
    /// Pins a specific upload; otherwise the newest record for the file is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_timestamp: Option<String>,
}

fn new_item_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl WorkItem {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        file_id: impl Into<String>,
        destination_table: impl Into<String>,
    ) -> Self {
        Self {
            id: new_item_id(),
            bucket: bucket.into(),
            key: key.into(),
            file_id: file_id.into(),
            destination_table: destination_table.into(),
            upload_timestamp: None,
        }
    }

    pub fn with_upload_timestamp(mut self, upload_timestamp: impl Into<String>) -> Self {
        self.upload_timestamp = Some(upload_timestamp.into());
        self
    }

    pub fn location(&self) -> DocumentLocation {
        DocumentLocation::new(&self.bucket, &self.key)
    }
}

/// Outcome of one work item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub item_id: String,
    pub file_id: String,
    pub key: Option<FileKey>,
    pub success: bool,
    /// Record status after the run; `None` if the record was never touched.
    pub final_status: Option<ProcessingStatus>,
    pub job_id: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl JobResult {
    pub fn success(item: &WorkItem, key: FileKey, job_id: String, duration_ms: u64) -> Self {
        Self {
            item_id: item.id.clone(),
            file_id: item.file_id.clone(),
            key: Some(key),
            success: true,
            final_status: Some(ProcessingStatus::Processed),
            job_id: Some(job_id),
            error: None,
            duration_ms,
        }
    }

    pub fn failure(
        item: &WorkItem,
        key: Option<FileKey>,
        final_status: Option<ProcessingStatus>,
        job_id: Option<String>,
        error: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            item_id: item.id.clone(),
            file_id: item.file_id.clone(),
            key,
            success: false,
            final_status,
            job_id,
            error: Some(error),
            duration_ms,
        }
    }
}
