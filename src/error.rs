// Error types for the preprocessing pipeline

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Error type for per-file transforms and batch setup
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Transform timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cancelled before processing")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Path {0} is not under the source root")]
    Layout(PathBuf),

    #[error("Transform panicked: {0}")]
    Panic(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Coarse error category recorded in batch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    Io,
    Shape,
    Artifact,
    Timeout,
    Cancelled,
    Config,
    Layout,
    Panic,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Decode(_) => ErrorKind::Decode,
            PipelineError::Io(_) => ErrorKind::Io,
            PipelineError::Shape(_) => ErrorKind::Shape,
            PipelineError::Artifact(_) => ErrorKind::Artifact,
            PipelineError::Timeout(_) => ErrorKind::Timeout,
            PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::Config(_) => ErrorKind::Config,
            PipelineError::Layout(_) => ErrorKind::Layout,
            PipelineError::Panic(_) => ErrorKind::Panic,
        }
    }
}

impl From<midly::Error> for PipelineError {
    fn from(e: midly::Error) -> Self {
        PipelineError::Decode(e.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(e: ndarray::ShapeError) -> Self {
        PipelineError::Shape(e.to_string())
    }
}
