use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};
use tracing::{info_span, Instrument};

use crate::analysis::http::HttpAnalysisService;
use crate::analysis::{AnalysisJobClient, JobName};
use crate::config::Config;
use crate::db::Database;
use crate::enrich::http::HttpTextAnalyticsService;
use crate::enrich::{Enricher, NlpAnalysis};
use crate::normalize;
use crate::sanitize;
use crate::status::{
    can_transition, FileKey, FileRecord, ProcessingStatus, ResultStore, StatusStore, Transition,
    TransitionOutcome,
};
use crate::worker::job::JobResult;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::{JobPhase, ProgressEvent, ProgressReporter};
use super::result::{ProcessingResult, ResultMetadata, PROCESSOR_VERSION};

#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    status: Arc<dyn StatusStore>,
    results: Arc<dyn ResultStore>,
    analysis: AnalysisJobClient,
    enricher: Enricher,
}

impl Pipeline {
    /// Production constructor: HTTP service clients plus the SQLite store.
    pub fn from_config(config: &Config, db: Database) -> Result<Self, PipelineError> {
        let pipeline_config = Arc::new(PipelineConfig::from_config(config));
        let analysis_service = Arc::new(HttpAnalysisService::from_config(&config.analysis)?);
        let nlp_service = Arc::new(HttpTextAnalyticsService::from_config(
            &config.text_analytics,
        )?);

        let analysis = AnalysisJobClient::new(
            analysis_service,
            pipeline_config.poll_interval,
            pipeline_config.max_poll_attempts,
        );
        let enricher = Enricher::new(nlp_service, pipeline_config.max_enrichment_chars);
        let store = Arc::new(db);

        Ok(Self::new(
            pipeline_config,
            store.clone(),
            store,
            analysis,
            enricher,
        ))
    }

    pub fn new(
        config: Arc<PipelineConfig>,
        status: Arc<dyn StatusStore>,
        results: Arc<dyn ResultStore>,
        analysis: AnalysisJobClient,
        enricher: Enricher,
    ) -> Self {
        Self {
            config,
            status,
            results,
            analysis,
            enricher,
        }
    }

    /// Run the full pipeline for a single work item.
    /// Returns a (JobResult, PipelineContext) pair.
    pub async fn run(
        &self,
        ctx: PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> (JobResult, PipelineContext) {
        let span = info_span!("pipeline",
            item_id = %ctx.item.id,
            file_id = %ctx.item.file_id,
            object = %sanitize::redact_key(&ctx.item.key),
            location = %sanitize::hash_location(&ctx.item.bucket, &ctx.item.key),
        );
        self.run_steps(ctx, progress).instrument(span).await
    }

    async fn run_steps(
        &self,
        mut ctx: PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> (JobResult, PipelineContext) {
        // Step 1: Validate the item and claim the record
        let record = {
            let _step = info_span!("claim_record").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Queued,
                message: "Claiming file record...".to_string(),
            });
            match self.step_claim(&mut ctx) {
                Ok(record) => record,
                Err((e, current)) => return self.reject(ctx, e, current, progress),
            }
        };
        debug!("Claimed {} (was {})", record.key, record.processing_status);

        // Step 2: Submit the analysis job
        progress.report(ProgressEvent::Phase {
            phase: JobPhase::Submitting,
            message: "Submitting document for analysis...".to_string(),
        });
        if let Err(e) = self
            .step_submit(&mut ctx)
            .instrument(info_span!("submit"))
            .await
        {
            return self.abort(ctx, e, progress);
        }

        // Step 3: Poll until the job finishes
        progress.report(ProgressEvent::Phase {
            phase: JobPhase::Polling,
            message: "Waiting for analysis results...".to_string(),
        });
        if let Err(e) = self.step_poll(&mut ctx).instrument(info_span!("poll")).await {
            return self.abort(ctx, e, progress);
        }

        // Step 4: Normalize
        {
            let _step = info_span!("normalize").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Normalizing,
                message: "Normalizing extracted text...".to_string(),
            });
            self.step_normalize(&mut ctx);
        }

        // Step 5: Enrich
        progress.report(ProgressEvent::Phase {
            phase: JobPhase::Enriching,
            message: "Running text analytics...".to_string(),
        });
        self.step_enrich(&mut ctx)
            .instrument(info_span!("enrich"))
            .await;

        // Step 6: Persist the result
        {
            let _step = info_span!("persist").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Persisting,
                message: "Saving processing result...".to_string(),
            });
            if let Err(e) = self.step_persist(&mut ctx) {
                return self.abort(ctx, e, progress);
            }
        }

        // Step 7: Finalize the record
        let _step = info_span!("complete").entered();
        self.step_complete(ctx, progress)
    }

    /// Resolves the record and moves it to `processing`. On rejection, the
    /// error travels with the record's status as last observed.
    fn step_claim(
        &self,
        ctx: &mut PipelineContext,
    ) -> Result<FileRecord, (PipelineError, Option<ProcessingStatus>)> {
        self.validate_item(ctx).map_err(|e| (e, None))?;

        let record = self.resolve_record(ctx).map_err(|e| (e, None))?;
        let current = record.processing_status;
        ctx.key = Some(record.key.clone());

        if current == ProcessingStatus::Processing {
            return Err((PipelineError::AlreadyProcessing(record.key), Some(current)));
        }
        if !can_transition(current, ProcessingStatus::Processing) {
            return Err((
                PipelineError::NotStartable {
                    key: record.key,
                    status: current,
                },
                Some(current),
            ));
        }

        let transition = Transition::Start {
            started_at: Utc::now(),
        };
        let outcome = self
            .status
            .compare_and_swap(&record.key, current, &transition)
            .map_err(|e| (PipelineError::from(e), Some(current)))?;

        match outcome {
            TransitionOutcome::Applied => {
                ctx.started = Some(Instant::now());
                Ok(record)
            }
            TransitionOutcome::Skipped {
                current: Some(ProcessingStatus::Processing),
            } => Err((
                PipelineError::AlreadyProcessing(record.key),
                Some(ProcessingStatus::Processing),
            )),
            TransitionOutcome::Skipped {
                current: Some(status),
            } => Err((
                PipelineError::NotStartable {
                    key: record.key,
                    status,
                },
                Some(status),
            )),
            TransitionOutcome::Skipped { current: None } => Err((
                PipelineError::RecordNotFound {
                    file_id: ctx.item.file_id.clone(),
                },
                None,
            )),
        }
    }

    fn validate_item(&self, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let item = &ctx.item;
        for (field, value) in [
            ("bucket", &item.bucket),
            ("key", &item.key),
            ("fileId", &item.file_id),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::InvalidWorkItem(format!(
                    "'{}' must not be empty",
                    field
                )));
            }
        }

        if item.destination_table != self.config.status_table {
            return Err(PipelineError::UnknownDestination {
                expected: self.config.status_table.clone(),
                actual: item.destination_table.clone(),
            });
        }
        Ok(())
    }

    fn resolve_record(&self, ctx: &PipelineContext) -> Result<FileRecord, PipelineError> {
        let file_id = &ctx.item.file_id;
        let found = match &ctx.item.upload_timestamp {
            Some(ts) => self.status.get(&FileKey::new(file_id.clone(), ts.clone()))?,
            None => self.status.latest_for_file(file_id)?,
        };
        found.ok_or_else(|| PipelineError::RecordNotFound {
            file_id: file_id.clone(),
        })
    }

    async fn step_submit(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let job_name = JobName::new(&ctx.item.file_id, Utc::now())?;
        let job_id = self
            .analysis
            .submit(&ctx.item.location(), &job_name)
            .await?;

        if let Some(key) = &ctx.key {
            if !self.status.attach_job_id(key, &job_id, Utc::now())? {
                warn!(
                    "Record {} left processing before job {} could be attached",
                    key, job_id
                );
            }
        }

        ctx.job_name = Some(job_name);
        ctx.job_id = Some(job_id);
        Ok(())
    }

    async fn step_poll(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let Some(job_id) = ctx.job_id.clone() else {
            return Err(PipelineError::InvalidWorkItem(
                "poll requested before submission".to_string(),
            ));
        };
        let started = Instant::now();
        let extracted = self.analysis.poll_until_done(&job_id).await?;
        ctx.analysis_duration_ms = started.elapsed().as_millis() as u64;
        ctx.extracted = Some(extracted);
        Ok(())
    }

    fn step_normalize(&self, ctx: &mut PipelineContext) {
        let raw = ctx.extracted.as_ref().map(|e| e.text.as_str()).unwrap_or("");
        ctx.normalized = Some(normalize::normalize(raw));
    }

    async fn step_enrich(&self, ctx: &mut PipelineContext) {
        let text = ctx
            .normalized
            .as_ref()
            .map(|n| n.formatted_text.clone())
            .unwrap_or_default();

        if text.trim().is_empty() {
            debug!("No text to enrich, skipping text analytics");
            ctx.nlp = Some(NlpAnalysis::empty());
            return;
        }

        let started = Instant::now();
        let nlp = self.enricher.enrich(&text).await;
        ctx.enrichment_duration_ms = started.elapsed().as_millis() as u64;
        if !nlp.failed_analyses.is_empty() {
            warn!(
                "Text analytics degraded for {}: {:?}",
                ctx.item.file_id, nlp.failed_analyses
            );
        }
        ctx.nlp = Some(nlp);
    }

    fn step_persist(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let (Some(key), Some(extracted), Some(job_id), Some(job_name)) = (
            ctx.key.as_ref(),
            ctx.extracted.as_ref(),
            ctx.job_id.as_ref(),
            ctx.job_name.as_ref(),
        ) else {
            return Err(PipelineError::InvalidWorkItem(
                "persist requested before analysis finished".to_string(),
            ));
        };

        let metadata = ResultMetadata {
            processor_version: PROCESSOR_VERSION.to_string(),
            job_id: job_id.clone(),
            job_name: job_name.to_string(),
            analysis_duration_ms: ctx.analysis_duration_ms,
            enrichment_duration_ms: ctx.enrichment_duration_ms,
            total_duration_ms: ctx.elapsed_ms(),
            processed_at: Utc::now(),
        };

        let result = ProcessingResult::assemble(
            &key.file_id,
            &key.upload_timestamp,
            extracted,
            ctx.normalized.take().unwrap_or_default(),
            ctx.nlp.take().unwrap_or_else(NlpAnalysis::empty),
            metadata,
        );
        self.results.put_result(&key.file_id, &result)?;
        debug!(
            "Stored result for {}: {} words, {} paragraphs",
            key,
            result.analysis.word_count,
            result.text_stats.paragraph_count
        );
        Ok(())
    }

    fn step_complete(
        &self,
        ctx: PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> (JobResult, PipelineContext) {
        let (Some(key), Some(job_id)) = (ctx.key.clone(), ctx.job_id.clone()) else {
            let e = PipelineError::InvalidWorkItem("completion without a job".to_string());
            return self.abort(ctx, e, progress);
        };

        let duration_ms = ctx.elapsed_ms();
        let transition = Transition::Complete {
            completed_at: Utc::now(),
            duration_ms: Some(duration_ms as i64),
        };

        match self
            .status
            .compare_and_swap(&key, ProcessingStatus::Processing, &transition)
        {
            Ok(TransitionOutcome::Applied) => {
                info!("Processed {} in {}ms (job {})", key, duration_ms, job_id);
                progress.report(ProgressEvent::Completed {
                    key: key.clone(),
                    job_id: job_id.clone(),
                    status: ProcessingStatus::Processed,
                });
                (JobResult::success(&ctx.item, key, job_id, duration_ms), ctx)
            }
            Ok(TransitionOutcome::Skipped { current }) => {
                let e = PipelineError::FinalizedConcurrently {
                    key: key.clone(),
                    current: current
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "missing".to_string()),
                };
                warn!("{}", e);
                let err_msg = e.to_string();
                progress.report(ProgressEvent::Failed {
                    error: err_msg.clone(),
                });
                let result = JobResult::failure(
                    &ctx.item,
                    Some(key),
                    current,
                    Some(job_id),
                    err_msg,
                    duration_ms,
                );
                (result, ctx)
            }
            Err(e) => self.abort(ctx, e.into(), progress),
        }
    }

    /// Reports a failure that happened before the record was claimed.
    fn reject(
        &self,
        ctx: PipelineContext,
        error: PipelineError,
        current: Option<ProcessingStatus>,
        progress: &dyn ProgressReporter,
    ) -> (JobResult, PipelineContext) {
        warn!("Rejected work item {}: {}", ctx.item.id, error);
        let err_msg = error.to_string();
        progress.report(ProgressEvent::Failed {
            error: err_msg.clone(),
        });
        let result = JobResult::failure(&ctx.item, ctx.key.clone(), current, None, err_msg, 0);
        (result, ctx)
    }

    /// Moves a claimed record to `failed`, unless another writer already
    /// finalized it.
    fn abort(
        &self,
        ctx: PipelineContext,
        error: PipelineError,
        progress: &dyn ProgressReporter,
    ) -> (JobResult, PipelineContext) {
        let err_msg = error.to_string();
        let duration_ms = ctx.elapsed_ms();
        let mut final_status = None;

        if let Some(key) = &ctx.key {
            let transition = Transition::Fail {
                failed_at: Utc::now(),
                reason: err_msg.clone(),
            };
            match self
                .status
                .compare_and_swap(key, ProcessingStatus::Processing, &transition)
            {
                Ok(TransitionOutcome::Applied) => {
                    final_status = Some(ProcessingStatus::Failed);
                }
                Ok(TransitionOutcome::Skipped { current }) => {
                    info!(
                        "Record {} already finalized as {:?}, not marking failed",
                        key, current
                    );
                    final_status = current;
                }
                Err(e) => {
                    log::error!("Failed to mark {} as failed: {}", key, e);
                    final_status = Some(ProcessingStatus::Processing);
                }
            }
        }

        log::error!("Processing {} failed: {}", ctx.item.file_id, err_msg);
        progress.report(ProgressEvent::Failed {
            error: err_msg.clone(),
        });
        let result = JobResult::failure(
            &ctx.item,
            ctx.key.clone(),
            final_status,
            ctx.job_id.clone(),
            err_msg,
            duration_ms,
        );
        (result, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::JobStatus;
    use crate::pipeline::progress::{NoopProgress, RecordingProgress};
    use crate::testing::{pipeline, seeded, FakeAnalysis, TABLE};
    use crate::worker::job::WorkItem;

    fn item() -> WorkItem {
        WorkItem::new("docs", "uploads/f1/a.pdf", "f1", TABLE)
    }

    #[tokio::test]
    async fn test_happy_path_marks_processed() {
        let (db, key) = seeded(ProcessingStatus::Uploaded);
        let pipeline = pipeline(
            &db,
            FakeAnalysis::succeeding(vec![
                ("Hello World.", Some(98.0)),
                ("This is fine.", Some(92.0)),
            ]),
        );
        let progress = RecordingProgress::default();

        let (result, ctx) = pipeline
            .run(PipelineContext::new(item()), &progress)
            .await;

        assert!(result.success, "pipeline failed: {:?}", result.error);
        assert_eq!(result.job_id.as_deref(), Some("job-1"));
        assert!(ctx.job_name.is_some());

        let record = db.get(&key).unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Processed);
        assert_eq!(record.batch_job_id.as_deref(), Some("job-1"));
        assert!(record.processing_completed_at.is_some());

        let stored = db.get_result("f1").unwrap().unwrap();
        assert_eq!(stored.analysis.average_confidence, 95.0);
        assert_eq!(stored.nlp_analysis.language, "unknown");
        assert_eq!(stored.metadata.job_id, "job-1");

        assert_eq!(
            progress.phases(),
            vec![
                JobPhase::Queued,
                JobPhase::Submitting,
                JobPhase::Polling,
                JobPhase::Normalizing,
                JobPhase::Enriching,
                JobPhase::Persisting,
                JobPhase::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_job_failure_marks_failed_without_result() {
        let (db, key) = seeded(ProcessingStatus::Uploaded);
        let analysis = FakeAnalysis::with_status(JobStatus::Failed, Some("unsupported format"));
        let pipeline = pipeline(&db, analysis);

        let (result, _) = pipeline
            .run(PipelineContext::new(item()), &NoopProgress)
            .await;

        assert!(!result.success);
        assert_eq!(result.final_status, Some(ProcessingStatus::Failed));
        let record = db.get(&key).unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Failed);
        assert!(record
            .error_message
            .unwrap()
            .contains("unsupported format"));
        assert!(db.get_result("f1").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_submission_failure_marks_failed() {
        let (db, key) = seeded(ProcessingStatus::Uploaded);
        let mut analysis = FakeAnalysis::succeeding(vec![]);
        analysis.fail_submit = true;
        let pipeline = pipeline(&db, analysis);

        let (result, _) = pipeline
            .run(PipelineContext::new(item()), &NoopProgress)
            .await;

        assert!(!result.success);
        assert!(result.job_id.is_none());
        let record = db.get(&key).unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn test_timeout_marks_failed() {
        let (db, key) = seeded(ProcessingStatus::Uploaded);
        let analysis = FakeAnalysis::with_status(JobStatus::InProgress, None);
        let pipeline = pipeline(&db, analysis);

        let (result, _) = pipeline
            .run(PipelineContext::new(item()), &NoopProgress)
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("did not finish"));
        let record = db.get(&key).unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn test_already_processing_is_left_alone() {
        let (db, key) = seeded(ProcessingStatus::Processing);
        let pipeline = pipeline(&db, FakeAnalysis::succeeding(vec![("x", None)]));

        let (result, ctx) = pipeline
            .run(PipelineContext::new(item()), &NoopProgress)
            .await;

        assert!(!result.success);
        assert_eq!(result.final_status, Some(ProcessingStatus::Processing));
        assert!(ctx.job_id.is_none());
        let record = db.get(&key).unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Processing);
    }

    #[tokio::test]
    async fn test_processed_record_not_restarted() {
        let (db, _key) = seeded(ProcessingStatus::Processed);
        let pipeline = pipeline(&db, FakeAnalysis::succeeding(vec![("x", None)]));

        let (result, _) = pipeline
            .run(PipelineContext::new(item()), &NoopProgress)
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("cannot be processed"));
    }

    #[tokio::test]
    async fn test_failed_record_can_be_resubmitted() {
        let (db, key) = seeded(ProcessingStatus::Failed);
        let pipeline = pipeline(&db, FakeAnalysis::succeeding(vec![("Again.", Some(90.0))]));

        let (result, _) = pipeline
            .run(PipelineContext::new(item()), &NoopProgress)
            .await;

        assert!(result.success, "pipeline failed: {:?}", result.error);
        let record = db.get(&key).unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Processed);
        assert!(record.error_message.is_none());
    }

    #[tokio::test]
    async fn test_unknown_destination_rejected() {
        let (db, key) = seeded(ProcessingStatus::Uploaded);
        let pipeline = pipeline(&db, FakeAnalysis::succeeding(vec![]));
        let mut item = item();
        item.destination_table = "other-table".to_string();

        let (result, _) = pipeline
            .run(PipelineContext::new(item), &NoopProgress)
            .await;

        assert!(!result.success);
        assert!(result.final_status.is_none());
        let record = db.get(&key).unwrap().unwrap();
        assert_eq!(record.processing_status, ProcessingStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_missing_record_rejected() {
        let db = Database::open_in_memory().unwrap();
        let pipeline = pipeline(&db, FakeAnalysis::succeeding(vec![]));

        let (result, _) = pipeline
            .run(PipelineContext::new(item()), &NoopProgress)
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("No file record"));
    }

    #[tokio::test]
    async fn test_blank_text_skips_enrichment() {
        let (db, key) = seeded(ProcessingStatus::Uploaded);
        let pipeline = pipeline(&db, FakeAnalysis::succeeding(vec![]));

        let (result, _) = pipeline
            .run(PipelineContext::new(item()), &NoopProgress)
            .await;

        assert!(result.success);
        let stored = db.get_result(&key.file_id).unwrap().unwrap();
        assert!(stored.nlp_analysis.failed_analyses.is_empty());
        assert_eq!(stored.text_stats.paragraph_count, 0);
    }
}
