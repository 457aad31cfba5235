//! Fakes shared by unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::analysis::{
    AnalysisJobClient, AnalysisPage, AnalysisService, Block, DocumentLocation, JobStatus,
};
use crate::db::{file_repo, Database};
use crate::enrich::{
    DetectedEntity, Enricher, KeyPhrase, LanguageScore, Sentiment, SyntaxToken,
    TextAnalyticsService,
};
use crate::error::ServiceError;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::status::{FileKey, FileRecord, ProcessingStatus};

pub const TABLE: &str = "file-records";
pub const UPLOADED_AT: &str = "2026-01-01T00:00:00.000Z";

/// Answers every poll with the same status and blocks.
pub struct FakeAnalysis {
    pub status: JobStatus,
    pub lines: Vec<(&'static str, Option<f64>)>,
    pub reason: Option<String>,
    pub fail_submit: bool,
    pub panic_on_submit: bool,
}

impl FakeAnalysis {
    pub fn succeeding(lines: Vec<(&'static str, Option<f64>)>) -> Self {
        Self {
            status: JobStatus::Succeeded,
            lines,
            reason: None,
            fail_submit: false,
            panic_on_submit: false,
        }
    }

    pub fn with_status(status: JobStatus, reason: Option<&str>) -> Self {
        Self {
            status,
            lines: Vec::new(),
            reason: reason.map(str::to_string),
            fail_submit: false,
            panic_on_submit: false,
        }
    }
}

#[async_trait]
impl AnalysisService for FakeAnalysis {
    async fn start_analysis(
        &self,
        _location: &DocumentLocation,
        _job_tag: &str,
    ) -> Result<String, ServiceError> {
        if self.panic_on_submit {
            panic!("analysis client bug");
        }
        if self.fail_submit {
            return Err(ServiceError::Status {
                status: 400,
                body: "bad document".to_string(),
            });
        }
        Ok("job-1".to_string())
    }

    async fn get_analysis(
        &self,
        _job_id: &str,
        _next_token: Option<&str>,
    ) -> Result<AnalysisPage, ServiceError> {
        Ok(AnalysisPage {
            job_status: self.status,
            status_message: self.reason.clone(),
            blocks: self
                .lines
                .iter()
                .map(|(text, conf)| Block::line(*text, *conf))
                .collect(),
            next_token: None,
        })
    }
}

/// Every sub-call fails; the enricher degrades all fields.
pub struct DownNlp;

fn down<T>() -> Result<T, ServiceError> {
    Err(ServiceError::Transport("connection refused".to_string()))
}

#[async_trait]
impl TextAnalyticsService for DownNlp {
    async fn detect_language(&self, _text: &str) -> Result<Vec<LanguageScore>, ServiceError> {
        down()
    }

    async fn detect_sentiment(&self, _text: &str, _code: &str) -> Result<Sentiment, ServiceError> {
        down()
    }

    async fn detect_entities(
        &self,
        _text: &str,
        _code: &str,
    ) -> Result<Vec<DetectedEntity>, ServiceError> {
        down()
    }

    async fn detect_key_phrases(
        &self,
        _text: &str,
        _code: &str,
    ) -> Result<Vec<KeyPhrase>, ServiceError> {
        down()
    }

    async fn detect_syntax(
        &self,
        _text: &str,
        _code: &str,
    ) -> Result<Vec<SyntaxToken>, ServiceError> {
        down()
    }
}

pub fn pipeline(db: &Database, analysis: FakeAnalysis) -> Pipeline {
    let config = Arc::new(PipelineConfig {
        status_table: TABLE.to_string(),
        poll_interval: Duration::from_millis(1),
        max_poll_attempts: 3,
        max_enrichment_chars: 5000,
    });
    let store = Arc::new(db.clone());
    Pipeline::new(
        config,
        store.clone(),
        store,
        AnalysisJobClient::new(Arc::new(analysis), Duration::from_millis(1), 3),
        Enricher::new(Arc::new(DownNlp), 5000),
    )
}

pub fn insert_record(db: &Database, file_id: &str, status: ProcessingStatus) -> FileKey {
    let key = FileKey::new(file_id, UPLOADED_AT);
    let mut record = FileRecord::uploaded(key.clone(), Some("a.pdf".to_string()), Utc::now());
    record.processing_status = status;
    if status == ProcessingStatus::Processing {
        record.processing_started_at = Some(Utc::now());
    }
    file_repo::insert(db, &record).unwrap();
    key
}

pub fn seeded(status: ProcessingStatus) -> (Database, FileKey) {
    let db = Database::open_in_memory().unwrap();
    let key = insert_record(&db, "f1", status);
    (db, key)
}
