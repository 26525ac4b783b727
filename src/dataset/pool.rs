//! Bounded worker pool for per-file transforms
//!
//! The calling thread walks the source tree and feeds a bounded channel;
//! named worker threads pull one file at a time, run the transform and
//! persist the artifact. Every queued file ends up in the report exactly
//! once, as produced or failed.
//!
//! ## Failure isolation
//! - Transform errors and panics are recorded per file
//! - An optional per-file timeout runs the transform on a helper thread; a
//!   late result is discarded and never written
//! - A timed-out helper cannot be killed and runs until its transform
//!   returns, so a batch of stuck files can hold more threads than
//!   `worker_count`. The piano-roll duration limit keeps ordinary inputs
//!   from getting there
//! - Cancellation is checked between work units

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::layout::ensure_dir;
use super::report::{BatchReport, FileOutcome, ReportCollector};
use super::walker::{require_source_root, walk, WorkItem};
use super::{CancelToken, FileTransform};
use crate::artifact::{write_artifact, Artifact};
use crate::config::{RunnerConfig, SuffixPair};
use crate::error::{PipelineError, Result};

/// Everything a batch run needs besides the transform itself
pub struct BatchJob<'a> {
    pub stage: &'a str,
    pub source_root: &'a Path,
    pub destination_root: &'a Path,
    pub suffixes: &'a SuffixPair,
}

/// Apply `transform` to every matching file under the job's source root.
///
/// Only setup failures (missing source root, thread spawn failure) are
/// returned as errors; per-file problems land in the report.
pub fn run_batch(
    job: &BatchJob<'_>,
    transform: Arc<dyn FileTransform>,
    runner: &RunnerConfig,
    cancel: &CancelToken,
) -> Result<BatchReport> {
    let started_at = Utc::now();
    let worker_count = runner.worker_count();
    let timeout = runner.file_timeout_secs.map(Duration::from_secs);

    log::info!(
        "[{}] {} -> {} ({} workers, suffix .{} -> .{})",
        job.stage,
        job.source_root.display(),
        job.destination_root.display(),
        worker_count,
        job.suffixes.source,
        job.suffixes.target,
    );

    require_source_root(job.source_root)?;
    ensure_dir(job.destination_root)?;

    // Bounded queue provides backpressure on the walker
    let (item_sender, item_receiver) = bounded::<WorkItem>(runner.queue_capacity.max(1));
    let collector = Arc::new(ReportCollector::default());

    let mut workers = Vec::with_capacity(worker_count);
    for index in 0..worker_count {
        let receiver = item_receiver.clone();
        let transform = Arc::clone(&transform);
        let collector = Arc::clone(&collector);
        let cancel = cancel.clone();
        let handle = std::thread::Builder::new()
            .name(format!("jamprep-worker-{}", index))
            .spawn(move || worker_main(receiver, transform, collector, cancel, timeout))?;
        workers.push(handle);
    }
    drop(item_receiver);

    let walk_result = walk(
        job.source_root,
        job.destination_root,
        job.suffixes,
        cancel,
        |item| item_sender.send(item).is_ok(),
    );

    // Closing the queue lets workers drain and exit
    drop(item_sender);
    for handle in workers {
        if handle.join().is_err() {
            log::error!("[{}] worker thread panicked", job.stage);
        }
    }

    let summary = walk_result?;
    for issue in summary.issues {
        collector.record_walk_error(issue);
    }
    let (outcomes, walk_errors) = collector.take();

    let report = BatchReport {
        stage: job.stage.to_string(),
        source_root: job.source_root.to_path_buf(),
        destination_root: job.destination_root.to_path_buf(),
        started_at,
        finished_at: Utc::now(),
        leaf_dirs: summary.leaf_dirs,
        outcomes,
        walk_errors,
        cancelled: cancel.is_cancelled(),
    };
    report.log_summary();
    Ok(report)
}

fn worker_main(
    receiver: Receiver<WorkItem>,
    transform: Arc<dyn FileTransform>,
    collector: Arc<ReportCollector>,
    cancel: CancelToken,
    timeout: Option<Duration>,
) {
    for item in receiver.iter() {
        if cancel.is_cancelled() {
            collector.record(FileOutcome::failed(&item.source, &item.destination, &PipelineError::Cancelled));
            continue;
        }

        let result = apply_transform(&transform, &item.source, timeout)
            .and_then(|artifact| write_artifact(&item.destination, &artifact));

        match result {
            Ok(()) => {
                log::debug!("Wrote {}", item.destination.display());
                collector.record(FileOutcome::produced(&item.source, &item.destination));
            }
            Err(e) => {
                log::warn!("Failed to process {}: {}", item.source.display(), e);
                collector.record(FileOutcome::failed(&item.source, &item.destination, &e));
            }
        }
    }
}

/// Run the transform, isolating panics and enforcing the optional timeout.
pub fn apply_transform(
    transform: &Arc<dyn FileTransform>,
    source: &Path,
    timeout: Option<Duration>,
) -> Result<Artifact> {
    let Some(limit) = timeout else {
        return guarded(|| transform.apply(source));
    };

    let (result_sender, result_receiver) = bounded(1);
    let transform = Arc::clone(transform);
    let owned_source = source.to_path_buf();
    std::thread::Builder::new()
        .name("jamprep-transform".into())
        .spawn(move || {
            // Receiver may be gone after a timeout; the result is dropped then
            let _ = result_sender.send(guarded(|| transform.apply(&owned_source)));
        })?;

    match result_receiver.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!(
                "{} exceeded {:?}; its transform thread is left to finish in the background",
                source.display(),
                limit
            );
            Err(PipelineError::Timeout(limit))
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(PipelineError::Panic("transform thread exited without a result".into()))
        }
    }
}

fn guarded<F>(f: F) -> Result<Artifact>
where
    F: FnOnce() -> Result<Artifact>,
{
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(PipelineError::Panic(panic_message(payload))))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
