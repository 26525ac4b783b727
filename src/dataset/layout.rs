// Corpus layout rules: leaf predicate, destination mapping, suffix handling
//
// Lakh-style corpora bucket tracks under single-character hash levels:
//   lmd_matched/R/F/C/TRRFCAT128F426A5B1/<md5>.mid
// Track directories are the ones whose names are longer than one character.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// True for names that cannot be a hash bucket level
pub fn is_leaf_track_name(name: &OsStr) -> bool {
    name.to_string_lossy().chars().count() != 1
}

/// A leaf track directory is a directory whose name is not exactly one
/// character long.
pub fn is_leaf_track_dir(path: &Path) -> bool {
    path.is_dir() && path.file_name().map_or(false, is_leaf_track_name)
}

/// Map `dir` under `source_root` to the same relative location under
/// `destination_root`.
pub fn mirror_dir(source_root: &Path, destination_root: &Path, dir: &Path) -> Result<PathBuf> {
    let relative = dir
        .strip_prefix(source_root)
        .map_err(|_| PipelineError::Layout(dir.to_path_buf()))?;
    Ok(destination_root.join(relative))
}

/// Whether the file's final extension is exactly `suffix` (no leading dot)
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.extension().map_or(false, |ext| ext == OsStr::new(suffix))
}

/// Replace the final extension of `file_name` with `suffix`.
pub fn swap_suffix(file_name: &Path, suffix: &str) -> PathBuf {
    file_name.with_extension(suffix)
}

/// Create `dir` and its parents. An existing directory, including one
/// created concurrently by another worker, is success.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    match std::fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e.into()),
    }
}
