// Dataset traversal, mirroring and batch execution

pub mod layout;
pub mod pool;
pub mod report;
pub mod walker;

pub use layout::*;
pub use pool::{apply_transform, run_batch, BatchJob};
pub use report::*;
pub use walker::{require_source_root, walk, WalkSummary, WorkItem};

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::artifact::Artifact;
use crate::error::Result;

/// A one-to-one file transform: read `source`, compute its artifact.
///
/// Implementations must not write anything themselves; the runner persists
/// the returned artifact only once the transform has fully succeeded.
pub trait FileTransform: Send + Sync {
    fn apply(&self, source: &Path) -> Result<Artifact>;
}

impl<F> FileTransform for F
where
    F: Fn(&Path) -> Result<Artifact> + Send + Sync,
{
    fn apply(&self, source: &Path) -> Result<Artifact> {
        self(source)
    }
}

/// Cooperative cancellation flag shared by the walker and workers
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
