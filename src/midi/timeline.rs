// Standard MIDI File decode/encode

use midly::Smf;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// A decoded MIDI timeline: header (format + timing) and delta-timed tracks.
///
/// Borrows meta/sysex payloads from the byte buffer it was decoded from.
pub type Timeline<'a> = Smf<'a>;

/// Read a MIDI file into memory. Missing or unreadable files surface as
/// decode errors since the caller cannot do anything with the item.
pub fn read_midi_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| PipelineError::Decode(format!("cannot read {}: {}", path.display(), e)))
}

/// Parse SMF bytes into a timeline.
pub fn decode(data: &[u8]) -> Result<Timeline<'_>> {
    let smf = Smf::parse(data)?;
    Ok(smf)
}

/// Serialize a timeline back into SMF bytes.
pub fn encode(timeline: &Timeline<'_>) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    timeline.write_std(&mut bytes)?;
    Ok(bytes)
}
