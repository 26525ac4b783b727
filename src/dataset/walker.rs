// Sequential dataset walker: finds track directories and queues their files

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::layout::{ensure_dir, has_suffix, is_leaf_track_name, mirror_dir, swap_suffix};
use super::report::WalkIssue;
use super::CancelToken;
use crate::config::SuffixPair;
use crate::error::{PipelineError, Result};

/// One file to transform and where its artifact goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Default)]
pub struct WalkSummary {
    pub leaf_dirs: usize,
    pub queued: usize,
    pub issues: Vec<WalkIssue>,
}

/// Walk `source_root`, mirroring every leaf track directory under
/// `destination_root` and handing each matching file to `emit`.
///
/// Non-leaf directories are still descended into. Entries are visited in
/// file-name order. Unreadable entries are recorded and skipped. The walk
/// stops early when `cancel` fires or `emit` returns `false`.
pub fn walk<F>(
    source_root: &Path,
    destination_root: &Path,
    suffixes: &SuffixPair,
    cancel: &CancelToken,
    mut emit: F,
) -> Result<WalkSummary>
where
    F: FnMut(WorkItem) -> bool,
{
    require_source_root(source_root)?;

    let mut summary = WalkSummary::default();

    for entry in WalkDir::new(source_root).min_depth(1).sort_by_file_name() {
        if cancel.is_cancelled() {
            log::info!("Walk of {} cancelled", source_root.display());
            break;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                summary.issues.push(WalkIssue {
                    path: e.path().map(Path::to_path_buf),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_dir() || !is_leaf_track_name(entry.file_name()) {
            continue;
        }
        summary.leaf_dirs += 1;

        let dir = entry.path();
        let target_dir = match mirror_dir(source_root, destination_root, dir)
            .and_then(|target| ensure_dir(&target).map(|_| target))
        {
            Ok(target) => target,
            Err(e) => {
                log::warn!("Cannot mirror {}: {}", dir.display(), e);
                summary.issues.push(WalkIssue {
                    path: Some(dir.to_path_buf()),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let files = match matching_files(dir, &suffixes.source) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Cannot list {}: {}", dir.display(), e);
                summary.issues.push(WalkIssue {
                    path: Some(dir.to_path_buf()),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        for source in files {
            let Some(file_name) = source.file_name() else { continue };
            let destination = target_dir.join(swap_suffix(Path::new(file_name), &suffixes.target));
            summary.queued += 1;
            if !emit(WorkItem { source, destination }) {
                log::debug!("Work queue closed, stopping walk");
                return Ok(summary);
            }
        }
    }

    Ok(summary)
}

/// Fail with `NotFound` unless `source_root` is an existing directory
pub fn require_source_root(source_root: &Path) -> Result<()> {
    if source_root.is_dir() {
        return Ok(());
    }
    Err(PipelineError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("source root {} is not a directory", source_root.display()),
    )))
}

/// Regular files directly inside `dir` with the given suffix, sorted by name
fn matching_files(dir: &Path, suffix: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && has_suffix(&path, suffix) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
