pub mod analysis;
pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod http;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod sanitize;
pub mod secrets;
pub mod status;
pub mod telemetry;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{AnalysisJobClient, AnalysisService, DocumentLocation, JobName};
pub use config::{load_config, Config};
pub use db::Database;
pub use enrich::{Enricher, NlpAnalysis, TextAnalyticsService};
pub use error::{
    AnalysisError, ConfigError, DocflowError, Result, ServiceError, StoreError, WorkerError,
};
pub use normalize::{normalize, NormalizedText};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext, ProcessingResult};
pub use reconcile::{
    DeadJobDetector, JobCompletionEvent, JobCompletionReconciler, ReconcileOutcome,
    SweepScheduler,
};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use status::{FileKey, FileRecord, ProcessingStatus, ResultStore, StatusStore};
pub use worker::{JobResult, WorkItem, WorkerPool};
