use std::fmt;

use crate::status::{FileKey, ProcessingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Queued,
    Submitting,
    Polling,
    Normalizing,
    Enriching,
    Persisting,
    Completed,
    Failed,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobPhase::Queued => "queued",
            JobPhase::Submitting => "submitting",
            JobPhase::Polling => "polling",
            JobPhase::Normalizing => "normalizing",
            JobPhase::Enriching => "enriching",
            JobPhase::Persisting => "persisting",
            JobPhase::Completed => "completed",
            JobPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Events emitted by the pipeline during processing.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Phase {
        phase: JobPhase,
        message: String,
    },
    Completed {
        key: FileKey,
        job_id: String,
        status: ProcessingStatus,
    },
    Failed {
        error: String,
    },
}

impl ProgressEvent {
    pub fn phase(&self) -> JobPhase {
        match self {
            ProgressEvent::Phase { phase, .. } => *phase,
            ProgressEvent::Completed { .. } => JobPhase::Completed,
            ProgressEvent::Failed { .. } => JobPhase::Failed,
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes each event to the log, tagged with the work item id.
pub struct LogProgress {
    item_id: String,
}

impl LogProgress {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
        }
    }
}

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { phase, message } => {
                log::info!("[{}] {}: {}", self.item_id, phase, message);
            }
            ProgressEvent::Completed {
                key,
                job_id,
                status,
            } => {
                log::info!(
                    "[{}] {} finished as {} (job {})",
                    self.item_id,
                    key,
                    status,
                    job_id
                );
            }
            ProgressEvent::Failed { error } => {
                log::error!("[{}] failed: {}", self.item_id, error);
            }
        }
    }
}

/// Collects events in memory.
#[derive(Default)]
pub struct RecordingProgress {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn phases(&self) -> Vec<JobPhase> {
        self.events
            .lock()
            .map(|events| events.iter().map(ProgressEvent::phase).collect())
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
