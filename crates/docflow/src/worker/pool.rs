use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::progress::{LogProgress, ProgressReporter};
use crate::pipeline::{JobPhase, Pipeline, PipelineContext, ProgressEvent};
use crate::worker::job::{JobResult, WorkItem};

/// Fixed set of OS threads, each driving one work item at a time on its own
/// single-threaded runtime.
pub struct WorkerPool {
    item_sender: Sender<WorkItem>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(pipeline: Pipeline, worker_count: usize) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }
        let (item_sender, item_receiver) = bounded::<WorkItem>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<JobResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let item_rx = item_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_pipeline = pipeline.clone();

            let handle = thread::Builder::new()
                .name(format!("docflow-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, item_rx, result_tx, shutdown_flag, worker_pipeline);
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            item_sender,
            result_receiver,
            workers,
            shutdown,
        })
    }

    pub fn submit(&self, item: WorkItem) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.item_sender
            .send(item)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.item_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    item_receiver: Receiver<WorkItem>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Pipeline,
) {
    debug!("Worker {} started", worker_id);

    let mut runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Worker {} failed to build runtime: {}", worker_id, e);
            return;
        }
    };

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match item_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(item) => {
                debug!("Worker {} processing file {}", worker_id, item.file_id);

                let progress = LogProgress::new(&item.id);
                progress.report(ProgressEvent::Phase {
                    phase: JobPhase::Queued,
                    message: format!("Picked up by worker {}", worker_id),
                });

                let started = Instant::now();
                let ctx = PipelineContext::new(item.clone());
                let run = panic::catch_unwind(AssertUnwindSafe(|| {
                    runtime.block_on(pipeline.run(ctx, &progress))
                }));

                // The collector expects one result per item, panics included.
                let (result, rebuild) = match run {
                    Ok((result, _ctx)) => (result, false),
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(
                            "Worker {} panicked processing file {}: {}",
                            worker_id, item.file_id, message
                        );
                        let failure = JobResult::failure(
                            &item,
                            None,
                            None,
                            None,
                            format!("worker panicked: {}", message),
                            started.elapsed().as_millis() as u64,
                        );
                        (failure, true)
                    }
                };

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }

                if rebuild {
                    runtime = match build_runtime() {
                        Ok(rt) => rt,
                        Err(e) => {
                            error!("Worker {} failed to rebuild runtime: {}", worker_id, e);
                            break;
                        }
                    };
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} item channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn build_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
