//! In-process stand-ins for the external services.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use docflow::analysis::{AnalysisPage, AnalysisService, Block, DocumentLocation, JobStatus};
use docflow::enrich::{
    DetectedEntity, KeyPhrase, LanguageScore, Sentiment, SentimentScores, SyntaxToken,
    TextAnalyticsService,
};
use docflow::ServiceError;

/// Reports `IN_PROGRESS` for a number of polls, then a final status with
/// the configured line blocks split across result pages.
pub struct FakeAnalysis {
    pub job_id: String,
    pub final_status: JobStatus,
    pub status_message: Option<String>,
    pub lines: Vec<(String, Option<f64>)>,
    pub page_size: usize,
    pub polls_before_done: usize,
    pub submit_error: Option<ServiceError>,
    polls: AtomicUsize,
    tags: Mutex<Vec<String>>,
}

impl FakeAnalysis {
    pub fn with_lines(lines: &[(&str, Option<f64>)]) -> Self {
        Self {
            job_id: "job-1".to_string(),
            final_status: JobStatus::Succeeded,
            status_message: None,
            lines: lines
                .iter()
                .map(|(text, conf)| (text.to_string(), *conf))
                .collect(),
            page_size: usize::MAX,
            polls_before_done: 0,
            submit_error: None,
            polls: AtomicUsize::new(0),
            tags: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        let mut fake = Self::with_lines(&[]);
        fake.final_status = JobStatus::Failed;
        fake.status_message = Some(reason.to_string());
        fake
    }

    pub fn never_finishing() -> Self {
        let mut fake = Self::with_lines(&[]);
        fake.polls_before_done = usize::MAX;
        fake
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size.max(1);
        self
    }

    pub fn polls_before_done(mut self, polls: usize) -> Self {
        self.polls_before_done = polls;
        self
    }

    /// Job tags seen at submission.
    pub fn submitted_tags(&self) -> Vec<String> {
        self.tags.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn page(&self, index: usize) -> AnalysisPage {
        let start = index.saturating_mul(self.page_size);
        let blocks: Vec<Block> = self
            .lines
            .iter()
            .skip(start)
            .take(self.page_size)
            .map(|(text, conf)| Block::line(text.clone(), *conf))
            .collect();
        let next_token = if start.saturating_add(self.page_size) < self.lines.len() {
            Some(format!("page-{}", index + 1))
        } else {
            None
        };
        AnalysisPage {
            job_status: self.final_status,
            status_message: self.status_message.clone(),
            blocks,
            next_token,
        }
    }
}

#[async_trait]
impl AnalysisService for FakeAnalysis {
    async fn start_analysis(
        &self,
        _location: &DocumentLocation,
        job_tag: &str,
    ) -> Result<String, ServiceError> {
        if let Some(err) = &self.submit_error {
            return Err(err.clone());
        }
        self.tags.lock().unwrap().push(job_tag.to_string());
        Ok(self.job_id.clone())
    }

    async fn get_analysis(
        &self,
        _job_id: &str,
        next_token: Option<&str>,
    ) -> Result<AnalysisPage, ServiceError> {
        if let Some(token) = next_token {
            let index = token
                .strip_prefix("page-")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| ServiceError::Decode(format!("bad token {}", token)))?;
            return Ok(self.page(index));
        }

        let polled = self.polls.fetch_add(1, Ordering::SeqCst);
        if polled < self.polls_before_done {
            return Ok(AnalysisPage {
                job_status: JobStatus::InProgress,
                status_message: None,
                blocks: Vec::new(),
                next_token: None,
            });
        }
        Ok(self.page(0))
    }
}

/// A well-behaved NLP service that answers every sub-call.
#[derive(Default)]
pub struct FakeNlp {
    pub fail_sentiment: bool,
    pub texts_seen: Mutex<Vec<String>>,
}

#[async_trait]
impl TextAnalyticsService for FakeNlp {
    async fn detect_language(&self, text: &str) -> Result<Vec<LanguageScore>, ServiceError> {
        self.texts_seen.lock().unwrap().push(text.to_string());
        Ok(vec![
            LanguageScore {
                language_code: "de".to_string(),
                score: 0.02,
            },
            LanguageScore {
                language_code: "en".to_string(),
                score: 0.97,
            },
        ])
    }

    async fn detect_sentiment(&self, _text: &str, _code: &str) -> Result<Sentiment, ServiceError> {
        if self.fail_sentiment {
            return Err(ServiceError::Status {
                status: 503,
                body: "throttled".to_string(),
            });
        }
        Ok(Sentiment {
            sentiment: "POSITIVE".to_string(),
            scores: SentimentScores {
                positive: 0.9,
                negative: 0.02,
                neutral: 0.07,
                mixed: 0.01,
            },
        })
    }

    async fn detect_entities(
        &self,
        _text: &str,
        _code: &str,
    ) -> Result<Vec<DetectedEntity>, ServiceError> {
        Ok(vec![
            DetectedEntity {
                text: "Jane Smith".to_string(),
                entity_type: "PERSON".to_string(),
                score: 0.95,
                begin_offset: 0,
                end_offset: 10,
            },
            DetectedEntity {
                text: "Auckland".to_string(),
                entity_type: "LOCATION".to_string(),
                score: 0.6,
                begin_offset: 20,
                end_offset: 28,
            },
        ])
    }

    async fn detect_key_phrases(
        &self,
        _text: &str,
        _code: &str,
    ) -> Result<Vec<KeyPhrase>, ServiceError> {
        Ok(vec![KeyPhrase {
            text: "quarterly report".to_string(),
            score: 0.88,
            begin_offset: 30,
            end_offset: 46,
        }])
    }

    async fn detect_syntax(
        &self,
        _text: &str,
        _code: &str,
    ) -> Result<Vec<SyntaxToken>, ServiceError> {
        Ok(vec![SyntaxToken {
            token_id: 1,
            text: "Hello".to_string(),
            part_of_speech: "INTJ".to_string(),
            score: 0.99,
            begin_offset: 0,
            end_offset: 5,
        }])
    }
}
