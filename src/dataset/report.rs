// Batch reports: structured per-file outcomes for one stage run

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{ErrorKind, PipelineError};

/// What happened to one source file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Produced,
    Failed { kind: ErrorKind, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl FileOutcome {
    pub fn produced(source: &Path, destination: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            outcome: Outcome::Produced,
        }
    }

    pub fn failed(source: &Path, destination: &Path, error: &PipelineError) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            outcome: Outcome::Failed {
                kind: error.kind(),
                reason: error.to_string(),
            },
        }
    }

    pub fn is_produced(&self) -> bool {
        self.outcome == Outcome::Produced
    }
}

/// A directory entry the walker could not read or mirror
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkIssue {
    pub path: Option<PathBuf>,
    pub reason: String,
}

/// Result of running one stage over a dataset tree
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub stage: String,
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Leaf track directories visited
    pub leaf_dirs: usize,
    /// Every queued file, sorted by source path
    pub outcomes: Vec<FileOutcome>,
    pub walk_errors: Vec<WalkIssue>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn produced(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_produced()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.is_produced())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// No failed files and no walk errors
    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0 && self.walk_errors.is_empty()
    }

    pub fn log_summary(&self) {
        let elapsed = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        log::info!(
            "[{}] {} -> {}: {} produced, {} failed, {} walk errors, {} track dirs ({:.1}s){}",
            self.stage,
            self.source_root.display(),
            self.destination_root.display(),
            self.produced(),
            self.failure_count(),
            self.walk_errors.len(),
            self.leaf_dirs,
            elapsed,
            if self.cancelled { " [cancelled]" } else { "" },
        );
    }
}

/// Reports of a multi-stage run, in execution order
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub stages: Vec<BatchReport>,
}

impl PipelineReport {
    pub fn stage(&self, name: &str) -> Option<&BatchReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn total_failures(&self) -> usize {
        self.stages.iter().map(BatchReport::failure_count).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.stages.iter().all(BatchReport::is_clean)
    }
}

/// Thread-safe sink that workers append outcomes to
#[derive(Default)]
pub struct ReportCollector {
    outcomes: Mutex<Vec<FileOutcome>>,
    walk_errors: Mutex<Vec<WalkIssue>>,
}

impl ReportCollector {
    pub fn record(&self, outcome: FileOutcome) {
        self.outcomes.lock().push(outcome);
    }

    pub fn record_walk_error(&self, issue: WalkIssue) {
        self.walk_errors.lock().push(issue);
    }

    /// Drain collected outcomes, sorted by source path so that reports do
    /// not depend on worker scheduling.
    pub fn take(&self) -> (Vec<FileOutcome>, Vec<WalkIssue>) {
        let mut outcomes = std::mem::take(&mut *self.outcomes.lock());
        outcomes.sort_by(|a, b| a.source.cmp(&b.source));
        let walk_errors = std::mem::take(&mut *self.walk_errors.lock());
        (outcomes, walk_errors)
    }
}
