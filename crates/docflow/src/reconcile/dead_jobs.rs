use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info};
use serde::Serialize;

use super::ReconcileError;
use crate::config::DeadJobsConfig;
use crate::status::{ProcessingStatus, StatusStore, Transition, TransitionOutcome};

pub const PROCESSING_TIMEOUT_REASON: &str = "processing timeout";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Stale records found.
    pub scanned: usize,
    /// Records this sweep moved to `failed`.
    pub failed: usize,
    /// Records another writer finalized first.
    pub skipped: usize,
    /// Records whose transition errored; retried next sweep.
    pub errors: usize,
}

/// Fails records that have been `processing` longer than `timeout`.
pub struct DeadJobDetector {
    store: Arc<dyn StatusStore>,
    timeout: Duration,
}

impl DeadJobDetector {
    pub fn new(store: Arc<dyn StatusStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn from_config(
        store: Arc<dyn StatusStore>,
        config: &DeadJobsConfig,
    ) -> Result<Self, ReconcileError> {
        let timeout = i64::try_from(config.timeout_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .ok_or_else(|| {
                ReconcileError::TimeoutOutOfRange(format!("{} minutes", config.timeout_minutes))
            })?;
        Ok(Self::new(store, timeout))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, ReconcileError> {
        if self.timeout < Duration::zero() {
            return Err(ReconcileError::TimeoutOutOfRange(format!("{}", self.timeout)));
        }
        let cutoff = now
            .checked_sub_signed(self.timeout)
            .ok_or_else(|| ReconcileError::TimeoutOutOfRange(format!("{}", self.timeout)))?;
        let stale = self.store.find_stale(cutoff)?;
        let mut report = SweepReport {
            scanned: stale.len(),
            ..Default::default()
        };

        for record in stale {
            let transition = Transition::Fail {
                failed_at: now,
                reason: PROCESSING_TIMEOUT_REASON.to_string(),
            };
            match self
                .store
                .compare_and_swap(&record.key, ProcessingStatus::Processing, &transition)
            {
                Ok(TransitionOutcome::Applied) => {
                    info!(
                        "Marked {} failed: processing since {:?}",
                        record.key, record.processing_started_at
                    );
                    report.failed += 1;
                }
                Ok(TransitionOutcome::Skipped { current }) => {
                    debug!("{} finalized concurrently as {:?}", record.key, current);
                    report.skipped += 1;
                }
                Err(e) => {
                    error!("Failed to time out {}: {}", record.key, e);
                    report.errors += 1;
                }
            }
        }

        if report.scanned > 0 {
            info!(
                "Dead-job sweep: {} stale, {} failed, {} skipped, {} errors",
                report.scanned, report.failed, report.skipped, report.errors
            );
        }
        Ok(report)
    }
}
