// Pitch-class histogram: bar aggregation followed by an octave fold

use ndarray::{s, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::midi::PITCH_COUNT;

pub const PITCH_CLASSES: usize = 12;

/// Which pitch rows contribute when folding 128 pitches into 12 classes.
///
/// 128 rows hold ten complete octaves (`0..120`) plus a partial one
/// (`120..128`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OctaveFoldPolicy {
    /// Every complete octave but the highest: pitches `0..108`.
    /// Matches the histograms the existing chord models were trained on.
    ExcludeTopOctave,
    /// All complete octaves: pitches `0..120`
    CompleteOctaves,
    /// Every row, the partial top octave included: pitches `0..128`
    AllPitches,
}

impl Default for OctaveFoldPolicy {
    fn default() -> Self {
        Self::ExcludeTopOctave
    }
}

impl OctaveFoldPolicy {
    /// Number of leading pitch rows folded for a matrix with `rows` rows
    pub fn folded_rows(&self, rows: usize) -> usize {
        let octaves = rows / PITCH_CLASSES;
        match self {
            OctaveFoldPolicy::ExcludeTopOctave => octaves.saturating_sub(1) * PITCH_CLASSES,
            OctaveFoldPolicy::CompleteOctaves => octaves * PITCH_CLASSES,
            OctaveFoldPolicy::AllPitches => rows,
        }
    }
}

/// Sum each run of `bar_len` columns into one bar. A trailing partial bar
/// is dropped.
pub fn aggregate_bars(roll: ArrayView2<f32>, bar_len: usize) -> Array2<f32> {
    let bar_count = if bar_len == 0 { 0 } else { roll.ncols() / bar_len };
    let mut bars = Array2::<f32>::zeros((roll.nrows(), bar_count));

    for i in 0..bar_count {
        let window = roll.slice(s![.., i * bar_len..(i + 1) * bar_len]);
        bars.column_mut(i).assign(&window.sum_axis(Axis(1)));
    }

    bars
}

/// Fold pitch rows into pitch-class rows, lowest octave first.
pub fn fold_octaves(bars: ArrayView2<f32>, policy: OctaveFoldPolicy) -> Array2<f32> {
    let mut histogram = Array2::<f32>::zeros((PITCH_CLASSES, bars.ncols()));
    let rows = policy.folded_rows(bars.nrows());

    let mut start = 0;
    while start < rows {
        let end = (start + PITCH_CLASSES).min(rows);
        let block = bars.slice(s![start..end, ..]);
        let mut target = histogram.slice_mut(s![0..end - start, ..]);
        target += &block;
        start = end;
    }

    histogram
}

/// Build a `[12, T / bar_len]` pitch-class histogram from a `[128, T]` roll.
pub fn build_histogram(
    roll: ArrayView2<f32>,
    bar_len: usize,
    policy: OctaveFoldPolicy,
) -> Result<Array2<f32>> {
    if roll.nrows() != PITCH_COUNT {
        return Err(PipelineError::Shape(format!(
            "piano roll has {} rows, expected {}",
            roll.nrows(),
            PITCH_COUNT
        )));
    }
    if bar_len == 0 {
        return Err(PipelineError::Shape("bar length must be at least one column".into()));
    }

    let bars = aggregate_bars(roll, bar_len);
    Ok(fold_octaves(bars.view(), policy))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random roll with values in 0..128
    fn noisy_roll(columns: usize, seed: u64) -> Array2<f32> {
        let mut state = seed;
        Array2::from_shape_fn((PITCH_COUNT, columns), |_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) % 128) as f32
        })
    }

    #[test]
    fn single_note_scenario() {
        let mut roll = Array2::<f32>::zeros((128, 16));
        roll.slice_mut(s![60, 0..8]).fill(1.0);

        let histogram = build_histogram(roll.view(), 8, OctaveFoldPolicy::default()).unwrap();

        assert_eq!(histogram.shape(), &[12, 2]);
        assert_eq!(histogram[[0, 0]], 8.0);
        assert_eq!(histogram[[0, 1]], 0.0);
        assert_eq!(histogram.sum(), 8.0);
    }

    #[test]
    fn shape_follows_bar_count() {
        let roll = noisy_roll(8 * 5, 7);
        let histogram = build_histogram(roll.view(), 8, OctaveFoldPolicy::AllPitches).unwrap();
        assert_eq!(histogram.shape(), &[12, 5]);
    }

    #[test]
    fn trailing_partial_bar_is_dropped() {
        let roll = Array2::<f32>::ones((128, 8 * 3 + 5));
        let bars = aggregate_bars(roll.view(), 8);
        assert_eq!(bars.shape(), &[128, 3]);
        assert!(bars.iter().all(|&v| v == 8.0));
    }

    #[test]
    fn all_pitches_conserves_mass() {
        let roll = noisy_roll(32, 1);
        let histogram = build_histogram(roll.view(), 8, OctaveFoldPolicy::AllPitches).unwrap();
        assert_eq!(histogram.sum(), roll.sum());
    }

    #[test]
    fn complete_octaves_drops_rows_above_119() {
        let roll = noisy_roll(32, 2);
        let histogram = build_histogram(roll.view(), 8, OctaveFoldPolicy::CompleteOctaves).unwrap();
        let expected = roll.slice(s![0..120, ..]).sum();
        assert_eq!(histogram.sum(), expected);
        assert!(histogram.sum() <= roll.sum());
    }

    #[test]
    fn exclude_top_octave_drops_rows_above_107() {
        let roll = noisy_roll(32, 3);
        let histogram = build_histogram(roll.view(), 8, OctaveFoldPolicy::ExcludeTopOctave).unwrap();
        let expected = roll.slice(s![0..108, ..]).sum();
        assert_eq!(histogram.sum(), expected);
        assert!(histogram.sum() <= roll.sum());
    }

    #[test]
    fn policies_differ_only_at_the_top() {
        let mut roll = Array2::<f32>::zeros((128, 8));
        roll[[100, 0]] = 1.0; // class 4, octave 8
        roll[[110, 0]] = 1.0; // class 2, octave 9
        roll[[125, 0]] = 1.0; // class 5, partial octave

        let exclude = build_histogram(roll.view(), 8, OctaveFoldPolicy::ExcludeTopOctave).unwrap();
        let complete = build_histogram(roll.view(), 8, OctaveFoldPolicy::CompleteOctaves).unwrap();
        let all = build_histogram(roll.view(), 8, OctaveFoldPolicy::AllPitches).unwrap();

        assert_eq!(exclude.column(0).to_vec(), [0., 0., 0., 0., 1., 0., 0., 0., 0., 0., 0., 0.]);
        assert_eq!(complete.column(0).to_vec(), [0., 0., 1., 0., 1., 0., 0., 0., 0., 0., 0., 0.]);
        assert_eq!(all.column(0).to_vec(), [0., 0., 1., 0., 1., 1., 0., 0., 0., 0., 0., 0.]);
    }

    #[test]
    fn folded_row_counts() {
        assert_eq!(OctaveFoldPolicy::ExcludeTopOctave.folded_rows(128), 108);
        assert_eq!(OctaveFoldPolicy::CompleteOctaves.folded_rows(128), 120);
        assert_eq!(OctaveFoldPolicy::AllPitches.folded_rows(128), 128);
    }

    #[test]
    fn wrong_row_count_is_a_shape_error() {
        let roll = Array2::<f32>::zeros((88, 16));
        let err = build_histogram(roll.view(), 8, OctaveFoldPolicy::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Shape(_)));
    }

    #[test]
    fn all_zero_bars_are_valid() {
        let roll = Array2::<f32>::zeros((128, 24));
        let histogram = build_histogram(roll.view(), 8, OctaveFoldPolicy::default()).unwrap();
        assert_eq!(histogram.shape(), &[12, 3]);
        assert_eq!(histogram.sum(), 0.0);
    }
}
