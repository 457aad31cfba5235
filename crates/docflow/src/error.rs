use std::path::PathBuf;
use thiserror::Error;

use crate::status::ProcessingStatus;

#[derive(Error, Debug)]
pub enum DocflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] crate::reconcile::ReconcileError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] crate::telemetry::TelemetryError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Failure of a single call to an external service.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode service response: {0}")]
    Decode(String),

    #[error("Service client misconfigured: {0}")]
    Config(String),
}

/// Errors that abort the analysis stage. None of them are retried locally.
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error("Failed to submit document '{location}' for analysis: {source}")]
    Submission {
        location: String,
        #[source]
        source: ServiceError,
    },

    #[error("Analysis job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("Analysis job {job_id} did not finish after {attempts} polls")]
    JobTimeout { job_id: String, attempts: u32 },

    #[error("Failed to read status of analysis job {job_id}: {source}")]
    Poll {
        job_id: String,
        #[source]
        source: ServiceError,
    },
}

/// A failed text-analytics sub-call. Swallowed by the enricher, which
/// degrades only the affected field.
#[derive(Error, Debug, Clone)]
#[error("{analysis} detection failed: {source}")]
pub struct EnrichmentError {
    pub analysis: crate::enrich::AnalysisKind,
    #[source]
    pub source: ServiceError,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },

    #[error("Failed to serialize processing result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No file record found for {0}")]
    RecordNotFound(String),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, DocflowError>;
