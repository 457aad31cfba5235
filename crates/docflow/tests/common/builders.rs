//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use docflow::db::format_timestamp;
use docflow::{FileKey, FileRecord, JobCompletionEvent, ProcessingStatus};

/// Builder for `FileRecord` instances.
pub struct RecordBuilder {
    file_id: String,
    upload_timestamp: String,
    status: ProcessingStatus,
    job_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl RecordBuilder {
    pub fn new(file_id: &str) -> Self {
        Self {
            file_id: file_id.to_string(),
            upload_timestamp: "2026-03-01T09:00:00.000Z".to_string(),
            status: ProcessingStatus::Uploaded,
            job_id: None,
            started_at: None,
        }
    }

    pub fn uploaded_at(mut self, ts: DateTime<Utc>) -> Self {
        self.upload_timestamp = format_timestamp(ts);
        self
    }

    pub fn upload_timestamp(mut self, ts: &str) -> Self {
        self.upload_timestamp = ts.to_string();
        self
    }

    pub fn status(mut self, status: ProcessingStatus) -> Self {
        self.status = status;
        self
    }

    /// In `processing` since `ago` before now.
    pub fn processing_for(mut self, ago: Duration) -> Self {
        self.status = ProcessingStatus::Processing;
        self.started_at = Some(Utc::now() - ago);
        self
    }

    pub fn job_id(mut self, job_id: &str) -> Self {
        self.job_id = Some(job_id.to_string());
        self
    }

    pub fn build(self) -> FileRecord {
        let now = Utc::now();
        let mut record = FileRecord::uploaded(
            FileKey::new(self.file_id, self.upload_timestamp),
            Some("scan.pdf".to_string()),
            now,
        );
        record.processing_status = self.status;
        record.batch_job_id = self.job_id;
        record.processing_started_at = match (self.status, self.started_at) {
            (_, Some(at)) => Some(at),
            (ProcessingStatus::Processing, None) => Some(now),
            _ => None,
        };
        record
    }
}

pub fn completion_event(file_id: &str, job_id: &str, status: &str) -> JobCompletionEvent {
    JobCompletionEvent {
        job_id: job_id.to_string(),
        job_name: format!("process-file-{}-1772355600000", file_id),
        job_status: status.to_string(),
        status_reason: None,
    }
}

/// Builder for config JSON documents.
pub struct ConfigBuilder {
    value: Value,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            value: json!({
                "version": "1.0",
                "worker_count": 2,
                "analysis": { "endpoint": "http://localhost:4566" },
                "text_analytics": { "endpoint": "http://localhost:4566" }
            }),
        }
    }

    pub fn set(mut self, pointer: &str, value: Value) -> Self {
        let mut target = &mut self.value;
        for part in pointer.trim_start_matches('/').split('/') {
            if target.get(part).is_none() {
                target[part] = json!({});
            }
            target = &mut target[part];
        }
        *target = value;
        self
    }

    pub fn build(self) -> String {
        self.value.to_string()
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
