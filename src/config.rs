// Configuration management for jamprep

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::features::OctaveFoldPolicy;

/// Top-level configuration, usually loaded from `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the raw corpus lives and where processed trees are written
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Numeric parameters shared by every feature stage
    #[serde(default)]
    pub features: FeatureConfig,

    /// Input/output suffix pair per stage
    #[serde(default)]
    pub stages: StagesConfig,

    /// Worker pool parameters
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Root of the hashed corpus, e.g. `lmd_matched`
    pub source_root: PathBuf,

    /// Root under which `tempo_changed/`, `histo/`, `indexroll/` and
    /// `chords/` trees are created
    pub output_root: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("lmd_matched"),
            output_root: PathBuf::from("dataset"),
        }
    }
}

/// Feature extraction parameters.
///
/// The defaults reproduce the constants the existing training data was built
/// with: 4 Hz melody sampling, 8-column bars over a 32 Hz histogram roll,
/// 120 BPM tempo, 3-note chords and a `[48, 84)` melody range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Piano-roll sampling rate for melody extraction, in columns per second
    #[serde(default = "default_melody_fs")]
    pub melody_fs: f64,

    /// Piano-roll sampling rate for histogram building, in columns per second
    #[serde(default = "default_histogram_fs")]
    pub histogram_fs: f64,

    /// Number of histogram-roll columns aggregated into one bar
    #[serde(default = "default_bar_len")]
    pub bar_len: usize,

    /// Microseconds per quarter note written by the tempo normalizer
    #[serde(default = "default_tempo")]
    pub tempo_us_per_beat: u32,

    /// Pitch classes selected per bar
    #[serde(default = "default_chord_size")]
    pub chord_size: usize,

    /// Lowest melody pitch kept (inclusive)
    #[serde(default = "default_pitch_low")]
    pub melody_pitch_low: u8,

    /// Highest melody pitch bound (exclusive)
    #[serde(default = "default_pitch_high")]
    pub melody_pitch_high: u8,

    /// Which octaves contribute to the pitch-class fold
    #[serde(default)]
    pub octave_fold: OctaveFoldPolicy,

    /// CC64 value at or above which the sustain pedal counts as down
    #[serde(default = "default_sustain_threshold")]
    pub sustain_threshold: u8,

    /// Longest piece, in seconds, sampled into a piano roll
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            melody_fs: default_melody_fs(),
            histogram_fs: default_histogram_fs(),
            bar_len: default_bar_len(),
            tempo_us_per_beat: default_tempo(),
            chord_size: default_chord_size(),
            melody_pitch_low: default_pitch_low(),
            melody_pitch_high: default_pitch_high(),
            octave_fold: OctaveFoldPolicy::default(),
            sustain_threshold: default_sustain_threshold(),
            max_duration_secs: default_max_duration_secs(),
        }
    }
}

impl FeatureConfig {
    /// Melody pitch range as a half-open range
    pub fn melody_range(&self) -> std::ops::Range<u8> {
        self.melody_pitch_low..self.melody_pitch_high
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.melody_fs > 0.0) || !(self.histogram_fs > 0.0) {
            return Err(PipelineError::Config("sampling rates must be positive".into()));
        }
        if self.bar_len == 0 {
            return Err(PipelineError::Config("bar_len must be at least 1".into()));
        }
        if self.tempo_us_per_beat == 0 || self.tempo_us_per_beat > 0x00FF_FFFF {
            return Err(PipelineError::Config(format!(
                "tempo {} does not fit in a 24-bit tempo event",
                self.tempo_us_per_beat
            )));
        }
        if self.chord_size == 0 || self.chord_size > 12 {
            return Err(PipelineError::Config(format!(
                "chord_size must be in 1..=12, got {}",
                self.chord_size
            )));
        }
        if self.melody_pitch_low >= self.melody_pitch_high || self.melody_pitch_high > 128 {
            return Err(PipelineError::Config(format!(
                "invalid melody range [{}, {})",
                self.melody_pitch_low, self.melody_pitch_high
            )));
        }
        if self.sustain_threshold > 127 {
            return Err(PipelineError::Config("sustain_threshold must be <= 127".into()));
        }
        if !(self.max_duration_secs > 0.0) || !self.max_duration_secs.is_finite() {
            return Err(PipelineError::Config("max_duration_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Source and target suffix (without the dot) for one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixPair {
    pub source: String,
    pub target: String,
}

impl SuffixPair {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesConfig {
    #[serde(default = "default_tempo_suffixes")]
    pub tempo: SuffixPair,
    #[serde(default = "default_histogram_suffixes")]
    pub histogram: SuffixPair,
    #[serde(default = "default_chords_suffixes")]
    pub chords: SuffixPair,
    #[serde(default = "default_indexroll_suffixes")]
    pub indexroll: SuffixPair,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            tempo: default_tempo_suffixes(),
            histogram: default_histogram_suffixes(),
            chords: default_chords_suffixes(),
            indexroll: default_indexroll_suffixes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Worker threads; 0 picks available parallelism minus one
    #[serde(default)]
    pub workers: usize,

    /// Bound of the walker -> worker queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-file transform timeout; unset means no timeout
    #[serde(default)]
    pub file_timeout_secs: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: default_queue_capacity(),
            file_timeout_secs: None,
        }
    }
}

impl RunnerConfig {
    /// Resolve `workers = 0` to a concrete thread count
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        let n = std::thread::available_parallelism()
            .map(|v| v.get())
            .unwrap_or(1);
        n.saturating_sub(1).max(1)
    }
}

impl Config {
    /// Load config from `path` (or the default location) or return default
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);

        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(config) => return config,
                    Err(e) => {
                        log::warn!("Failed to parse config {}: {}", config_path.display(), e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read config file {}: {}", config_path.display(), e);
                }
            }
        }

        Self::default()
    }

    /// Save config to `path` (or the default location)
    pub fn save(&self, path: Option<&Path>) -> anyhow::Result<PathBuf> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;

        Ok(config_path)
    }

    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        if self.runner.queue_capacity == 0 {
            return Err(PipelineError::Config("queue_capacity must be at least 1".into()));
        }
        for (name, pair) in [
            ("tempo", &self.stages.tempo),
            ("histogram", &self.stages.histogram),
            ("chords", &self.stages.chords),
            ("indexroll", &self.stages.indexroll),
        ] {
            if pair.source.is_empty() || pair.target.is_empty() {
                return Err(PipelineError::Config(format!("empty suffix in stage {}", name)));
            }
        }
        Ok(())
    }
}

/// Get the default config file path
pub fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jamprep")
        .join("config.toml")
}

fn default_melody_fs() -> f64 {
    4.0
}

fn default_histogram_fs() -> f64 {
    32.0
}

fn default_bar_len() -> usize {
    8
}

fn default_tempo() -> u32 {
    500_000
}

fn default_chord_size() -> usize {
    3
}

fn default_pitch_low() -> u8 {
    48
}

fn default_pitch_high() -> u8 {
    84
}

fn default_sustain_threshold() -> u8 {
    64
}

fn default_max_duration_secs() -> f64 {
    3600.0
}

fn default_queue_capacity() -> usize {
    256
}

fn default_tempo_suffixes() -> SuffixPair {
    SuffixPair::new("mid", "mid")
}

fn default_histogram_suffixes() -> SuffixPair {
    SuffixPair::new("mid", "histo")
}

fn default_chords_suffixes() -> SuffixPair {
    SuffixPair::new("histo", "chords")
}

fn default_indexroll_suffixes() -> SuffixPair {
    SuffixPair::new("mid", "indexroll")
}
