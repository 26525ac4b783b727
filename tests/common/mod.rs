// Shared fixtures: small Standard MIDI Files laid out like a hashed corpus

#![allow(dead_code)]

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::{Path, PathBuf};

pub const TICKS_PER_BEAT: u16 = 480;

/// Single-track file playing `(pitch, beats)` notes back to back from tick 0
pub fn melody_bytes(notes: &[(u8, u32)], us_per_beat: u32) -> Vec<u8> {
    let mut events = vec![TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(us_per_beat))),
    }];
    for &(pitch, beats) in notes {
        events.push(note(0, pitch, true));
        events.push(note(beats * u32::from(TICKS_PER_BEAT), pitch, false));
    }
    events.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_BEAT)),
    ));
    smf.tracks.push(events);

    let mut out = Vec::new();
    smf.write_std(&mut out).unwrap();
    out
}

/// Valid file whose single note spans a thousand maximal deltas at one tick
/// per beat, tens of thousands of years at 120 BPM
pub fn endless_note_bytes() -> Vec<u8> {
    let mut events = vec![note(0, 60, true)];
    for _ in 0..1000 {
        events.push(TrackEvent {
            delta: u28::new(0x0FFF_FFFF),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::Controller { controller: u7::new(7), value: u7::new(90) },
            },
        });
    }
    events.push(note(0, 60, false));
    events.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(Format::SingleTrack, Timing::Metrical(u15::new(1))));
    smf.tracks.push(events);

    let mut out = Vec::new();
    smf.write_std(&mut out).unwrap();
    out
}

fn note(delta: u32, pitch: u8, on: bool) -> TrackEvent<'static> {
    let message = if on {
        MidiMessage::NoteOn { key: u7::new(pitch), vel: u7::new(100) }
    } else {
        MidiMessage::NoteOff { key: u7::new(pitch), vel: u7::new(0) }
    };
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi { channel: u4::new(0), message },
    }
}

/// Write `data` at `root/relative`, creating parents
pub fn put(root: &Path, relative: &str, data: &[u8]) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, data).unwrap();
    path
}

/// All tempo values found in a MIDI file, in track order
pub fn tempos(path: &Path) -> Vec<u32> {
    let data = std::fs::read(path).unwrap();
    let smf = Smf::parse(&data).unwrap();
    smf.tracks
        .iter()
        .flatten()
        .filter_map(|event| match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
            _ => None,
        })
        .collect()
}
