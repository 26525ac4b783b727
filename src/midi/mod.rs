// MIDI decoding, tempo handling and piano-roll sampling

pub mod notes;
pub mod pianoroll;
pub mod preview;
pub mod tempo;
pub mod timeline;

pub use notes::{extract_notes, NoteEvent, ParsedNotes, TempoEvent, TempoMap};
pub use pianoroll::{sample, sample_notes, PITCH_COUNT};
pub use preview::render_index_roll;
pub use tempo::normalize_tempo;
pub use timeline::{decode, encode, read_midi_file, Timeline};
