// Skyline melody extraction over a piano roll

use ndarray::ArrayView2;
use std::ops::Range;

use crate::error::{PipelineError, Result};
use crate::midi::PITCH_COUNT;

/// One entry per piano-roll column: the top pitch, or `None` for silence
pub type IndexRoll = Vec<Option<u8>>;

/// Extract the skyline melody: per column, keep only the highest sounding
/// pitch. A top pitch outside `range` becomes silence rather than falling
/// back to a lower voice.
pub fn extract_melody(roll: ArrayView2<f32>, range: Range<u8>) -> Result<IndexRoll> {
    if roll.nrows() != PITCH_COUNT {
        return Err(PipelineError::Shape(format!(
            "piano roll has {} rows, expected {}",
            roll.nrows(),
            PITCH_COUNT
        )));
    }

    let melody = roll
        .columns()
        .into_iter()
        .map(|column| {
            (0..PITCH_COUNT)
                .rev()
                .find(|&pitch| column[pitch] != 0.0)
                .map(|pitch| pitch as u8)
                .filter(|pitch| range.contains(pitch))
        })
        .collect();

    Ok(melody)
}
