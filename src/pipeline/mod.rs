// Stage orchestration over a Lakh-style dataset

pub mod stage;

pub use stage::*;

use std::path::{Path, PathBuf};

use crate::artifact::{read_artifact, write_artifact, Artifact};
use crate::config::Config;
use crate::dataset::{run_batch, BatchJob, BatchReport, CancelToken, PipelineReport};
use crate::error::Result;
use crate::midi::{encode, render_index_roll};

/// Run one stage from `source_root` into `destination_root`.
pub fn run_stage(
    kind: StageKind,
    source_root: &Path,
    destination_root: &Path,
    config: &Config,
    cancel: &CancelToken,
) -> Result<BatchReport> {
    config.validate()?;

    let job = BatchJob {
        stage: kind.name(),
        source_root,
        destination_root,
        suffixes: kind.suffixes(&config.stages),
    };
    run_batch(&job, kind.transform(&config.features), &config.runner, cancel)
}

/// Output tree root of `kind` under the configured output root
pub fn stage_root(config: &Config, kind: StageKind) -> PathBuf {
    config.dataset.output_root.join(kind.output_dir_name())
}

/// Full chain: raw MIDI -> tempo-normalized MIDI -> {histogram, index-roll},
/// histogram -> chords. Each stage reads the previous stage's tree.
pub fn preprocess(config: &Config, cancel: &CancelToken) -> Result<PipelineReport> {
    config.validate()?;

    let tempo_root = stage_root(config, StageKind::Tempo);
    let histo_root = stage_root(config, StageKind::Histogram);
    let plan = [
        (StageKind::Tempo, config.dataset.source_root.clone(), tempo_root.clone()),
        (StageKind::Histogram, tempo_root.clone(), histo_root.clone()),
        (StageKind::IndexRoll, tempo_root, stage_root(config, StageKind::IndexRoll)),
        (StageKind::Chords, histo_root, stage_root(config, StageKind::Chords)),
    ];

    let mut report = PipelineReport::default();
    for (kind, source, destination) in plan {
        if cancel.is_cancelled() {
            log::info!("Skipping stage {} after cancellation", kind.name());
            break;
        }
        report.stages.push(run_stage(kind, &source, &destination, config, cancel)?);
    }

    log::info!(
        "Preprocessing finished: {} stages, {} failed files",
        report.stages.len(),
        report.total_failures()
    );
    Ok(report)
}

/// Render a stored index-roll as a MIDI file, one note per step.
pub fn preview_index_roll(source: &Path, destination: &Path, step_seconds: f64) -> Result<usize> {
    let roll = read_artifact(source)?.into_index_roll()?;
    let timeline = render_index_roll(&roll, step_seconds);
    write_artifact(destination, &Artifact::Midi(encode(&timeline)?))?;
    Ok(roll.iter().filter(|step| step.is_some()).count())
}
