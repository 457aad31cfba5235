use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::broadcast;

use docflow::db::{self, file_repo, format_timestamp};
use docflow::reconcile::SweepScheduler;
use docflow::secrets::expand_home;
use docflow::status::FileKey;
use docflow::{
    load_config, telemetry, Config, Database, DeadJobDetector, DocflowError, FileRecord,
    JobCompletionEvent, JobCompletionReconciler, Pipeline, ProcessingStatus, ResultStore,
    StatusStore, StoreError, WorkItem, WorkerPool,
};

#[derive(Parser)]
#[command(name = "docflow", version, about = "Document analysis pipeline")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, env = "DOCFLOW_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an `uploaded` record for a stored document
    Register {
        #[arg(long)]
        file_id: String,
        #[arg(long)]
        filename: Option<String>,
        /// Defaults to now
        #[arg(long)]
        upload_timestamp: Option<String>,
    },
    /// Run the pipeline for one or more work items (JSON, or @path to a JSON file)
    Process {
        #[arg(long = "work-item", required = true)]
        work_items: Vec<String>,
    },
    /// Apply a job-completion event (JSON, or @path to a JSON file)
    Reconcile {
        #[arg(long)]
        event: String,
    },
    /// Run one dead-job sweep
    Sweep,
    /// Sweep for dead jobs periodically until Ctrl-C
    Watch,
    /// Show records for a file or job, or counts per status
    Status {
        #[arg(long, conflicts_with = "job_id")]
        file_id: Option<String>,
        #[arg(long)]
        job_id: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = telemetry::init_tracing(&config.logging) {
        eprintln!("Warning: {}", e);
    }

    match run(cli.command, &config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command fully succeeded.
fn run(command: Command, config: &Config) -> Result<bool, DocflowError> {
    let db = open_database(config)?;

    match command {
        Command::Register {
            file_id,
            filename,
            upload_timestamp,
        } => {
            let now = Utc::now();
            let key = FileKey::new(
                file_id,
                upload_timestamp.unwrap_or_else(|| format_timestamp(now)),
            );
            let record = FileRecord::uploaded(key, filename, now);
            file_repo::insert(&db, &record)?;
            print_json(&record)?;
            Ok(true)
        }
        Command::Process { work_items } => {
            let items = work_items
                .iter()
                .map(|arg| parse_arg::<WorkItem>(arg))
                .collect::<Result<Vec<_>, _>>()?;
            process(config, db, items)
        }
        Command::Reconcile { event } => {
            let event: JobCompletionEvent = parse_arg(&event)?;
            let reconciler = JobCompletionReconciler::new(Arc::new(db));
            let outcome = reconciler.reconcile(&event)?;
            println!("{:?}", outcome);
            Ok(true)
        }
        Command::Sweep => {
            let detector = DeadJobDetector::from_config(Arc::new(db), &config.dead_jobs)?;
            let report = detector.sweep(Utc::now())?;
            print_json(&report)?;
            Ok(report.errors == 0)
        }
        Command::Watch => {
            watch(config, db)?;
            Ok(true)
        }
        Command::Status { file_id, job_id } => status(&db, file_id, job_id),
    }
}

fn open_database(config: &Config) -> Result<Database, DocflowError> {
    let path = match &config.database_path {
        Some(p) => PathBuf::from(expand_home(p)),
        None => db::default_database_path().ok_or_else(|| {
            DocflowError::InvalidInput(
                "no database_path configured and no home directory found".to_string(),
            )
        })?,
    };
    Ok(Database::open(&path)?)
}

fn process(config: &Config, db: Database, items: Vec<WorkItem>) -> Result<bool, DocflowError> {
    let pipeline = Pipeline::from_config(config, db)?;
    let worker_count = config.worker_count.clamp(1, items.len().max(1));
    let pool = WorkerPool::new(pipeline, worker_count)?;

    let total = items.len();
    let (results, submitted) = std::thread::scope(|s| {
        let collector = s.spawn(|| {
            (0..total)
                .map_while(|_| pool.recv_result())
                .collect::<Vec<_>>()
        });

        let mut submitted = Ok(());
        for item in items {
            if let Err(e) = pool.submit(item) {
                // Lets the collector see the result channel close.
                pool.shutdown();
                submitted = Err(e);
                break;
            }
        }
        (collector.join().unwrap_or_default(), submitted)
    });

    pool.shutdown();
    pool.wait();
    submitted?;

    let all_ok = results.len() == total && results.iter().all(|r| r.success);
    print_json(&results)?;
    Ok(all_ok)
}

fn watch(config: &Config, db: Database) -> Result<(), DocflowError> {
    let detector = Arc::new(DeadJobDetector::from_config(
        Arc::new(db),
        &config.dead_jobs,
    )?);
    let interval = Duration::from_secs(config.dead_jobs.sweep_interval_secs);
    let scheduler = SweepScheduler::new(detector, interval);

    let (trigger_tx, trigger_rx) = broadcast::channel(4);
    let handle = scheduler.start(trigger_rx)?;

    let (stop_tx, stop_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .map_err(|e| DocflowError::InvalidInput(format!("failed to install Ctrl-C handler: {}", e)))?;

    info!(
        "Sweeping every {}s for records processing longer than {} minutes. Press Ctrl-C to stop.",
        interval.as_secs(),
        config.dead_jobs.timeout_minutes
    );
    // Sweep once at startup
    let _ = trigger_tx.send(());

    let _ = stop_rx.recv();
    info!("Stopping dead-job sweeps...");
    scheduler.stop();
    let _ = trigger_tx.send(());
    if handle.join().is_err() {
        warn!("Sweep thread panicked");
    }
    info!(
        "Stopped after {} sweeps",
        scheduler.sweeps_completed()
    );
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusCounts {
    uploaded: u64,
    processing: u64,
    processed: u64,
    failed: u64,
}

fn status(
    db: &Database,
    file_id: Option<String>,
    job_id: Option<String>,
) -> Result<bool, DocflowError> {
    if let Some(job_id) = job_id {
        let record = file_repo::find_by_job_id(db, &job_id)?
            .ok_or_else(|| StoreError::RecordNotFound(format!("job '{}'", job_id)))?;
        print_json(&record)?;
        return Ok(true);
    }

    if let Some(file_id) = file_id {
        let records = db.find_by_file_id(&file_id)?;
        if records.is_empty() {
            return Err(StoreError::RecordNotFound(format!("file '{}'", file_id)).into());
        }
        print_json(&records)?;
        if let Some(result) = db.get_result(&file_id)? {
            println!(
                "result: {} words, {} paragraphs, confidence {:.1}, language {}",
                result.analysis.word_count,
                result.text_stats.paragraph_count,
                result.analysis.average_confidence,
                result.nlp_analysis.language
            );
        }
        return Ok(true);
    }

    let counts = StatusCounts {
        uploaded: file_repo::count_by_status(db, ProcessingStatus::Uploaded)?,
        processing: file_repo::count_by_status(db, ProcessingStatus::Processing)?,
        processed: file_repo::count_by_status(db, ProcessingStatus::Processed)?,
        failed: file_repo::count_by_status(db, ProcessingStatus::Failed)?,
    };
    print_json(&counts)?;
    Ok(true)
}

/// Parses inline JSON, or the contents of a file when prefixed with `@`.
fn parse_arg<T: serde::de::DeserializeOwned>(arg: &str) -> Result<T, DocflowError> {
    let content = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(expand_home(path))
            .map_err(|e| DocflowError::InvalidInput(format!("failed to read '{}': {}", path, e)))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&content).map_err(|e| DocflowError::InvalidInput(e.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DocflowError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| DocflowError::InvalidInput(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
