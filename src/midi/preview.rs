// Render a melody index-roll back to MIDI for listening checks

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use super::timeline::Timeline;

const PREVIEW_TICKS_PER_BEAT: u16 = 960;
const PREVIEW_US_PER_BEAT: u32 = 500_000;
const PREVIEW_VELOCITY: u8 = 100;

/// Build a single-track timeline playing one note per non-silent step.
///
/// Each step lasts `step_seconds`; consecutive equal pitches are played as
/// separate notes, the way the index-roll encodes them.
pub fn render_index_roll(roll: &[Option<u8>], step_seconds: f64) -> Timeline<'static> {
    let ticks_per_second =
        f64::from(PREVIEW_TICKS_PER_BEAT) * 1_000_000.0 / f64::from(PREVIEW_US_PER_BEAT);
    let step_ticks = ((step_seconds * ticks_per_second).round() as u32).max(1);

    let mut events = vec![TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(PREVIEW_US_PER_BEAT))),
    }];

    let mut last_tick: u32 = 0;
    for (i, step) in roll.iter().enumerate() {
        let Some(pitch) = *step else { continue };
        let start = i as u32 * step_ticks;
        events.push(note_event(start - last_tick, pitch, true));
        events.push(note_event(step_ticks, pitch, false));
        last_tick = start + step_ticks;
    }

    events.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(PREVIEW_TICKS_PER_BEAT)),
    ));
    smf.tracks.push(events);
    smf
}

fn note_event(delta: u32, pitch: u8, on: bool) -> TrackEvent<'static> {
    let key = u7::new(pitch.min(127));
    let message = if on {
        MidiMessage::NoteOn { key, vel: u7::new(PREVIEW_VELOCITY) }
    } else {
        MidiMessage::NoteOff { key, vel: u7::new(0) }
    };
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi { channel: u4::new(0), message },
    }
}
