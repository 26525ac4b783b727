// jamprep - MIDI corpus preprocessing for melody/chord models
// Main library entry point

pub mod artifact;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod midi;
pub mod pipeline;

pub use artifact::{read_artifact, write_artifact, Artifact};
pub use config::Config;
pub use dataset::{BatchReport, CancelToken, FileTransform, PipelineReport};
pub use error::{ErrorKind, PipelineError, Result};
pub use pipeline::{preprocess, preview_index_roll, run_stage, StageKind};
