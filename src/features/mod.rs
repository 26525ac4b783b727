// Numeric feature extraction: histograms, chords, melodies

pub mod chords;
pub mod histogram;
pub mod melody;

pub use chords::{extract_chords, Chord};
pub use histogram::{aggregate_bars, build_histogram, fold_octaves, OctaveFoldPolicy, PITCH_CLASSES};
pub use melody::{extract_melody, IndexRoll};
