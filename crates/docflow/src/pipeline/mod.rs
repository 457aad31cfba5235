pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod result;
pub mod runner;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::PipelineError;
pub use progress::{
    JobPhase, LogProgress, NoopProgress, ProgressEvent, ProgressReporter, RecordingProgress,
};
pub use result::{DocumentAnalysis, ProcessingResult, ResultMetadata, PROCESSOR_VERSION};
pub use runner::Pipeline;
