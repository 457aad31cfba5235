//! Document analysis: submit a stored document to the external OCR/layout
//! service, poll the job to completion and flatten the result pages.

pub mod http;
pub mod job_name;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, ServiceError};
use crate::sanitize;

pub use http::HttpAnalysisService;
pub use job_name::{JobName, JobNameError};

/// Where the document to analyse is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLocation {
    pub bucket: String,
    pub key: String,
}

impl DocumentLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// Log-safe rendering: bucket plus the final key segment.
impl fmt::Display for DocumentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/.../{}", self.bucket, sanitize::redact_key(&self.key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Succeeded,
    Failed,
    PartialSuccess,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl Block {
    pub fn line(text: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            block_type: "LINE".to_string(),
            text: Some(text.into()),
            confidence,
        }
    }

    pub fn is_line(&self) -> bool {
        self.block_type == "LINE"
    }

    pub fn is_page(&self) -> bool {
        self.block_type == "PAGE"
    }
}

/// One page of a job status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnalysisPage {
    pub job_status: JobStatus,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// The external document-analysis service.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Starts an asynchronous analysis job tagged with `job_tag`; returns its id.
    async fn start_analysis(
        &self,
        location: &DocumentLocation,
        job_tag: &str,
    ) -> Result<String, ServiceError>;

    /// Fetches job status and, once finished, one page of result blocks.
    async fn get_analysis(
        &self,
        job_id: &str,
        next_token: Option<&str>,
    ) -> Result<AnalysisPage, ServiceError>;
}

/// Flattened analysis output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedText {
    pub text: String,
    pub line_count: usize,
    /// Mean over LINE blocks that carry a confidence, 0-100. Zero when none do.
    pub average_confidence: f64,
    pub page_count: usize,
}

impl ExtractedText {
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut lines = Vec::new();
        let mut line_count = 0usize;
        let mut confidence_sum = 0.0;
        let mut confidence_count = 0usize;
        let mut page_count = 0usize;

        for block in blocks {
            if block.is_page() {
                page_count += 1;
                continue;
            }
            if !block.is_line() {
                continue;
            }
            line_count += 1;
            if let Some(text) = block.text.as_deref() {
                if !text.trim().is_empty() {
                    lines.push(text);
                }
            }
            if let Some(c) = block.confidence {
                confidence_sum += c;
                confidence_count += 1;
            }
        }

        let average_confidence = if confidence_count == 0 {
            0.0
        } else {
            confidence_sum / confidence_count as f64
        };

        Self {
            text: lines.join("\n"),
            line_count,
            average_confidence,
            page_count,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn character_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// A finished job together with its flattened text.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedDocument {
    pub job_id: String,
    pub extracted: ExtractedText,
}

/// Drives one analysis job: submit, poll with a fixed interval up to an
/// attempt ceiling, then follow continuation tokens.
#[derive(Clone)]
pub struct AnalysisJobClient {
    service: Arc<dyn AnalysisService>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl AnalysisJobClient {
    pub fn new(service: Arc<dyn AnalysisService>, poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            service,
            poll_interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn submit(
        &self,
        location: &DocumentLocation,
        job_name: &JobName,
    ) -> Result<String, AnalysisError> {
        let job_id = self
            .service
            .start_analysis(location, &job_name.to_string())
            .await
            .map_err(|source| AnalysisError::Submission {
                location: location.to_string(),
                source,
            })?;
        info!("Submitted {} for analysis as job {}", location, job_id);
        Ok(job_id)
    }

    pub async fn poll_until_done(&self, job_id: &str) -> Result<ExtractedText, AnalysisError> {
        for attempt in 1..=self.max_attempts {
            let page = self
                .service
                .get_analysis(job_id, None)
                .await
                .map_err(|source| AnalysisError::Poll {
                    job_id: job_id.to_string(),
                    source,
                })?;

            match page.job_status {
                JobStatus::Succeeded => return self.collect_pages(job_id, page).await,
                JobStatus::PartialSuccess => {
                    warn!(
                        "Analysis job {} finished with partial success: {}",
                        job_id,
                        page.status_message.as_deref().unwrap_or("no details")
                    );
                    return self.collect_pages(job_id, page).await;
                }
                JobStatus::Failed => {
                    return Err(AnalysisError::JobFailed {
                        job_id: job_id.to_string(),
                        reason: page
                            .status_message
                            .unwrap_or_else(|| "no reason given".to_string()),
                    });
                }
                JobStatus::InProgress => {
                    debug!(
                        "Analysis job {} in progress (attempt {}/{})",
                        job_id, attempt, self.max_attempts
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
            }
        }

        Err(AnalysisError::JobTimeout {
            job_id: job_id.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Submit and poll in one call.
    pub async fn analyze(
        &self,
        location: &DocumentLocation,
        job_name: &JobName,
    ) -> Result<AnalyzedDocument, AnalysisError> {
        let job_id = self.submit(location, job_name).await?;
        let extracted = self.poll_until_done(&job_id).await?;
        Ok(AnalyzedDocument { job_id, extracted })
    }

    async fn collect_pages(
        &self,
        job_id: &str,
        first: AnalysisPage,
    ) -> Result<ExtractedText, AnalysisError> {
        let mut blocks = first.blocks;
        let mut next_token = first.next_token;
        let mut pages = 1usize;

        while let Some(token) = next_token.take() {
            let page = self
                .service
                .get_analysis(job_id, Some(&token))
                .await
                .map_err(|source| AnalysisError::Poll {
                    job_id: job_id.to_string(),
                    source,
                })?;
            pages += 1;
            blocks.extend(page.blocks);
            next_token = page.next_token.filter(|next| *next != token);
        }

        let extracted = ExtractedText::from_blocks(&blocks);
        debug!(
            "Analysis job {}: {} result pages, {} lines, average confidence {:.1}",
            job_id, pages, extracted.line_count, extracted.average_confidence
        );
        Ok(extracted)
    }
}
