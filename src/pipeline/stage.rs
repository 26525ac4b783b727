// Per-file stage transforms

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use crate::artifact::{read_artifact, Artifact};
use crate::config::{FeatureConfig, StagesConfig, SuffixPair};
use crate::dataset::FileTransform;
use crate::error::{PipelineError, Result};
use crate::features::{build_histogram, extract_chords, extract_melody, OctaveFoldPolicy};
use crate::midi::{self, decode, encode, normalize_tempo, read_midi_file};

/// The four dataset stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// MIDI -> MIDI with every tempo pinned
    Tempo,
    /// MIDI -> pitch-class histogram
    Histogram,
    /// Histogram -> chord sequence
    Chords,
    /// MIDI -> melody index-roll
    IndexRoll,
}

impl StageKind {
    pub const ALL: &'static [StageKind] = &[
        StageKind::Tempo,
        StageKind::Histogram,
        StageKind::IndexRoll,
        StageKind::Chords,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Tempo => "tempo",
            StageKind::Histogram => "histogram",
            StageKind::Chords => "chords",
            StageKind::IndexRoll => "indexroll",
        }
    }

    /// Directory under the output root holding this stage's tree
    pub fn output_dir_name(&self) -> &'static str {
        match self {
            StageKind::Tempo => "tempo_changed",
            StageKind::Histogram => "histo",
            StageKind::Chords => "chords",
            StageKind::IndexRoll => "indexroll",
        }
    }

    pub fn suffixes<'a>(&self, stages: &'a StagesConfig) -> &'a SuffixPair {
        match self {
            StageKind::Tempo => &stages.tempo,
            StageKind::Histogram => &stages.histogram,
            StageKind::Chords => &stages.chords,
            StageKind::IndexRoll => &stages.indexroll,
        }
    }

    /// Build the transform for this stage from the feature parameters
    pub fn transform(&self, features: &FeatureConfig) -> Arc<dyn FileTransform> {
        match self {
            StageKind::Tempo => Arc::new(TempoStage {
                us_per_beat: features.tempo_us_per_beat,
            }),
            StageKind::Histogram => Arc::new(HistogramStage {
                fs: features.histogram_fs,
                bar_len: features.bar_len,
                policy: features.octave_fold,
                sustain_threshold: features.sustain_threshold,
                max_seconds: features.max_duration_secs,
            }),
            StageKind::Chords => Arc::new(ChordStage {
                chord_size: features.chord_size,
            }),
            StageKind::IndexRoll => Arc::new(IndexRollStage {
                fs: features.melody_fs,
                range: features.melody_range(),
                sustain_threshold: features.sustain_threshold,
                max_seconds: features.max_duration_secs,
            }),
        }
    }
}

pub struct TempoStage {
    pub us_per_beat: u32,
}

impl FileTransform for TempoStage {
    fn apply(&self, source: &Path) -> Result<Artifact> {
        let data = read_midi_file(source)?;
        let timeline = decode(&data)?;
        let normalized = normalize_tempo(&timeline, self.us_per_beat);
        Ok(Artifact::Midi(encode(&normalized)?))
    }
}

pub struct HistogramStage {
    pub fs: f64,
    pub bar_len: usize,
    pub policy: OctaveFoldPolicy,
    pub sustain_threshold: u8,
    pub max_seconds: f64,
}

impl FileTransform for HistogramStage {
    fn apply(&self, source: &Path) -> Result<Artifact> {
        let data = read_midi_file(source)?;
        let timeline = decode(&data)?;
        let roll = midi::sample(&timeline, self.fs, self.sustain_threshold, self.max_seconds)?;
        if roll.ncols() == 0 {
            return Err(PipelineError::Shape("piano roll is empty".into()));
        }
        let histogram = build_histogram(roll.view(), self.bar_len, self.policy)?;
        Ok(Artifact::Histogram(histogram))
    }
}

pub struct ChordStage {
    pub chord_size: usize,
}

impl FileTransform for ChordStage {
    fn apply(&self, source: &Path) -> Result<Artifact> {
        let histogram = read_artifact(source)
            .map_err(|e| match e {
                PipelineError::Io(io) => PipelineError::Decode(format!("cannot read {}: {}", source.display(), io)),
                other => other,
            })?
            .into_histogram()?;
        let chords = extract_chords(histogram.view(), self.chord_size)?;
        Ok(Artifact::Chords {
            chord_size: self.chord_size,
            chords,
        })
    }
}

pub struct IndexRollStage {
    pub fs: f64,
    pub range: Range<u8>,
    pub sustain_threshold: u8,
    pub max_seconds: f64,
}

impl FileTransform for IndexRollStage {
    fn apply(&self, source: &Path) -> Result<Artifact> {
        let data = read_midi_file(source)?;
        let timeline = decode(&data)?;
        let roll = midi::sample(&timeline, self.fs, self.sustain_threshold, self.max_seconds)?;
        if roll.ncols() == 0 {
            return Err(PipelineError::Shape("piano roll is empty".into()));
        }
        let melody = extract_melody(roll.view(), self.range.clone())?;
        Ok(Artifact::IndexRoll(melody))
    }
}
