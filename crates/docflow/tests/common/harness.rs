//! Test harness for isolated pipeline execution.
//!
//! The `TestHarness` struct wires a `Pipeline` to fake services and a fresh
//! database, in memory by default or on disk in a temp directory.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use docflow::analysis::AnalysisJobClient;
use docflow::pipeline::{NoopProgress, ProgressReporter};
use docflow::{
    Database, Enricher, FileKey, FileRecord, JobResult, Pipeline, PipelineConfig,
    PipelineContext, ProcessingResult, ProcessingStatus, ResultStore, StatusStore, WorkItem,
};

use super::builders::RecordBuilder;
use super::fakes::{FakeAnalysis, FakeNlp};

pub const STATUS_TABLE: &str = "file-records";

pub struct TestHarness {
    /// Keeps a file-backed database alive for the test's duration.
    temp_dir: Option<TempDir>,
    pub db: Database,
    pub analysis: Arc<FakeAnalysis>,
    pub nlp: Arc<FakeNlp>,
    pub max_poll_attempts: u32,
    pub max_enrichment_chars: usize,
}

impl TestHarness {
    /// In-memory database with the given analysis fake.
    pub fn new(analysis: FakeAnalysis) -> Self {
        Self {
            temp_dir: None,
            db: Database::open_in_memory().expect("Failed to open in-memory database"),
            analysis: Arc::new(analysis),
            nlp: Arc::new(FakeNlp::default()),
            max_poll_attempts: 5,
            max_enrichment_chars: 5000,
        }
    }

    /// Database file in a temp directory.
    pub fn file_backed(analysis: FakeAnalysis) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("data").join("docflow.db"))
            .expect("Failed to open database");
        Self {
            temp_dir: Some(temp_dir),
            db,
            ..Self::new(analysis)
        }
    }

    pub fn with_nlp(mut self, nlp: FakeNlp) -> Self {
        self.nlp = Arc::new(nlp);
        self
    }

    pub fn pipeline(&self) -> Pipeline {
        let config = Arc::new(PipelineConfig {
            status_table: STATUS_TABLE.to_string(),
            poll_interval: Duration::from_millis(1),
            max_poll_attempts: self.max_poll_attempts,
            max_enrichment_chars: self.max_enrichment_chars,
        });
        let store = Arc::new(self.db.clone());
        Pipeline::new(
            Arc::clone(&config),
            store.clone(),
            store,
            AnalysisJobClient::new(
                self.analysis.clone(),
                config.poll_interval,
                config.max_poll_attempts,
            ),
            Enricher::new(self.nlp.clone(), config.max_enrichment_chars),
        )
    }

    /// Inserts an `uploaded` record and returns its key.
    pub fn seed(&self, file_id: &str) -> FileKey {
        self.insert(RecordBuilder::new(file_id).build())
    }

    pub fn insert(&self, record: FileRecord) -> FileKey {
        let key = record.key.clone();
        docflow::db::file_repo::insert(&self.db, &record).expect("Failed to insert record");
        key
    }

    pub fn work_item(&self, key: &FileKey) -> WorkItem {
        WorkItem::new(
            "documents",
            format!("uploads/{}/scan.pdf", key.file_id),
            &key.file_id,
            STATUS_TABLE,
        )
    }

    pub async fn run(&self, item: WorkItem) -> (JobResult, PipelineContext) {
        self.run_with(item, &NoopProgress).await
    }

    pub async fn run_with(
        &self,
        item: WorkItem,
        progress: &dyn ProgressReporter,
    ) -> (JobResult, PipelineContext) {
        self.pipeline()
            .run(PipelineContext::new(item), progress)
            .await
    }

    pub fn record(&self, key: &FileKey) -> FileRecord {
        self.db
            .get(key)
            .expect("Failed to read record")
            .expect("Record missing")
    }

    pub fn status(&self, key: &FileKey) -> ProcessingStatus {
        self.record(key).processing_status
    }

    pub fn result(&self, file_id: &str) -> Option<ProcessingResult> {
        self.db.get_result(file_id).expect("Failed to read result")
    }
}
