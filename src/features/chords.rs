// Per-bar chord selection from a pitch-class histogram

use ndarray::ArrayView2;
use std::cmp::Ordering;

use super::histogram::PITCH_CLASSES;
use crate::error::{PipelineError, Result};

/// Pitch-class indices of one bar, ascending
pub type Chord = Vec<u8>;

/// Pick the `chord_size` most active pitch classes of every bar.
///
/// Classes are ranked by intensity, highest first; equal intensities keep
/// ascending index order, so the lower class index is picked first. The
/// selection is then sorted ascending. Every bar yields exactly
/// `chord_size` classes, zero-intensity ones included.
pub fn extract_chords(histogram: ArrayView2<f32>, chord_size: usize) -> Result<Vec<Chord>> {
    if histogram.nrows() != PITCH_CLASSES {
        return Err(PipelineError::Shape(format!(
            "histogram has {} rows, expected {}",
            histogram.nrows(),
            PITCH_CLASSES
        )));
    }
    if chord_size == 0 || chord_size > PITCH_CLASSES {
        return Err(PipelineError::Shape(format!(
            "chord size {} outside 1..={}",
            chord_size, PITCH_CLASSES
        )));
    }

    let chords = histogram
        .columns()
        .into_iter()
        .map(|bar| {
            let mut ranked: Vec<u8> = (0..PITCH_CLASSES as u8).collect();
            // Stable sort keeps ascending index order among ties
            ranked.sort_by(|&a, &b| intensity_order(bar[b as usize], bar[a as usize]));
            let mut chord: Chord = ranked.into_iter().take(chord_size).collect();
            chord.sort_unstable();
            chord
        })
        .collect();

    Ok(chords)
}

/// NaN ranks below every number
fn intensity_order(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}
