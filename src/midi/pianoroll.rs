// Piano-roll sampling: notes -> [128 x T] intensity matrix

use ndarray::{s, Array2};

use super::notes::{extract_notes, ParsedNotes};
use super::timeline::Timeline;
use crate::error::{PipelineError, Result};

/// Number of MIDI pitches, i.e. piano-roll rows
pub const PITCH_COUNT: usize = 128;

/// Sample a timeline into a `[128, T]` piano roll at `fs` columns per second.
pub fn sample(
    timeline: &Timeline<'_>,
    fs: f64,
    sustain_threshold: u8,
    max_seconds: f64,
) -> Result<Array2<f32>> {
    sample_notes(&extract_notes(timeline, sustain_threshold), fs, max_seconds)
}

/// Sample already-extracted notes into a piano roll.
///
/// `T = floor(end * fs)` where `end` is the time the last note stops,
/// drums included. Each non-drum note adds its velocity to columns
/// `[floor(start * fs), floor(end * fs))` of its pitch row, so overlapping
/// notes of the same pitch sum.
///
/// Pieces lasting longer than `max_seconds` are rejected with a shape error
/// before the roll is allocated.
pub fn sample_notes(parsed: &ParsedNotes, fs: f64, max_seconds: f64) -> Result<Array2<f32>> {
    let end = parsed.end_seconds();
    if !(end <= max_seconds) {
        return Err(PipelineError::Shape(format!(
            "piece lasts {:.1} s, longer than the {:.1} s limit",
            end, max_seconds
        )));
    }
    let columns = to_column(end, fs);
    if columns.checked_mul(PITCH_COUNT).is_none() {
        return Err(PipelineError::Shape(format!("{} roll columns do not fit in memory", columns)));
    }
    let mut roll = Array2::<f32>::zeros((PITCH_COUNT, columns));

    for note in parsed.events.iter().filter(|n| !n.is_drum()) {
        let start = to_column(parsed.tempo_map.seconds(note.start_tick), fs).min(columns);
        let end = to_column(parsed.tempo_map.seconds(note.end_tick()), fs).min(columns);
        if start >= end {
            continue;
        }
        let mut cells = roll.slice_mut(s![note.pitch as usize, start..end]);
        cells += f32::from(note.velocity);
    }

    Ok(roll)
}

fn to_column(seconds: f64, fs: f64) -> usize {
    (seconds * fs).floor().max(0.0) as usize
}
