//! Periodic dead-job sweep.
//!
//! Runs the detector on a fixed interval in a background thread and
//! supports a manual trigger via broadcast channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};

use super::dead_jobs::DeadJobDetector;
use crate::error::WorkerError;

pub struct SweepScheduler {
    detector: Arc<DeadJobDetector>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    sweeps: Arc<AtomicU64>,
}

impl SweepScheduler {
    pub fn new(detector: Arc<DeadJobDetector>, interval: Duration) -> Self {
        Self {
            detector,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            sweeps: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start the sweep loop in a background thread.
    /// Accepts a trigger receiver for manual sweep requests.
    pub fn start(
        &self,
        mut trigger_rx: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, WorkerError> {
        let detector = Arc::clone(&self.detector);
        let shutdown = Arc::clone(&self.shutdown);
        let sweeps = Arc::clone(&self.sweeps);
        let interval = self.interval;

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        std::thread::Builder::new()
            .name("docflow-sweep".to_string())
            .spawn(move || {
                rt.block_on(async {
                    let mut interval_timer = tokio::time::interval(interval);
                    interval_timer.tick().await; // skip immediate first tick
                    let mut triggers_open = true;

                    loop {
                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        tokio::select! {
                            _ = interval_timer.tick() => {},
                            msg = trigger_rx.recv(), if triggers_open => match msg {
                                Ok(()) | Err(RecvError::Lagged(_)) => {
                                    log::info!("Manual dead-job sweep triggered");
                                }
                                Err(RecvError::Closed) => {
                                    triggers_open = false;
                                    continue;
                                }
                            },
                        }

                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        if let Err(e) = detector.sweep(Utc::now()) {
                            log::error!("Dead-job sweep failed: {}", e);
                        }
                        sweeps.fetch_add(1, Ordering::AcqRel);
                    }
                });
            })
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))
    }

    /// Number of sweeps run so far.
    pub fn sweeps_completed(&self) -> u64 {
        self.sweeps.load(Ordering::Acquire)
    }

    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::status::{ProcessingStatus, StatusStore};
    use crate::testing::insert_record;

    fn wait_for(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not met within 2s");
    }

    #[test]
    fn test_scheduler_shutdown() {
        let db = Database::open_in_memory().unwrap();
        let detector = Arc::new(DeadJobDetector::new(
            Arc::new(db),
            chrono::Duration::minutes(120),
        ));
        let scheduler = SweepScheduler::new(detector, Duration::from_millis(50));

        let (trigger_tx, trigger_rx) = broadcast::channel(16);
        let handle = scheduler.start(trigger_rx).unwrap();

        wait_for(|| scheduler.sweeps_completed() > 0);
        scheduler.stop();

        // Send a trigger to wake up the select loop so it sees the shutdown
        let _ = trigger_tx.send(());

        handle.join().expect("scheduler thread panicked");
    }

    #[test]
    fn test_manual_trigger_runs_sweep() {
        let db = Database::open_in_memory().unwrap();
        let key = insert_record(&db, "f1", ProcessingStatus::Processing);
        let detector = Arc::new(DeadJobDetector::new(
            Arc::new(db.clone()),
            chrono::Duration::zero(),
        ));
        let scheduler = SweepScheduler::new(detector, Duration::from_secs(3600));

        let (trigger_tx, trigger_rx) = broadcast::channel(16);
        let handle = scheduler.start(trigger_rx).unwrap();

        wait_for(|| {
            let _ = trigger_tx.send(());
            db.get(&key).unwrap().unwrap().processing_status == ProcessingStatus::Failed
        });

        scheduler.stop();
        let _ = trigger_tx.send(());
        handle.join().expect("scheduler thread panicked");
    }
}
