use std::time::Instant;

use crate::analysis::{ExtractedText, JobName};
use crate::enrich::NlpAnalysis;
use crate::normalize::NormalizedText;
use crate::status::FileKey;
use crate::worker::job::WorkItem;

pub struct PipelineContext {
    // Input
    pub item: WorkItem,

    // Resolved before any state change
    pub key: Option<FileKey>,

    // Set once the record is in `processing`
    pub started: Option<Instant>,

    // Submission
    pub job_name: Option<JobName>,
    pub job_id: Option<String>,

    // Analysis result, Some after step_poll
    pub extracted: Option<ExtractedText>,
    pub analysis_duration_ms: u64,

    pub normalized: Option<NormalizedText>,

    pub nlp: Option<NlpAnalysis>,
    pub enrichment_duration_ms: u64,
}

impl PipelineContext {
    pub fn new(item: WorkItem) -> Self {
        Self {
            item,
            key: None,
            started: None,
            job_name: None,
            job_id: None,
            extracted: None,
            analysis_duration_ms: 0,
            normalized: None,
            nlp: None,
            enrichment_duration_ms: 0,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started
            .map(|s| s.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }
}
