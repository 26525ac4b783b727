// Note extraction with sustain pedal support, plus tick -> seconds conversion

use midly::{MetaMessage, MidiMessage, Timing, TrackEventKind};
use std::collections::HashMap;

use super::timeline::Timeline;

/// General MIDI percussion channel (channel 10, zero-based 9)
pub const DRUM_CHANNEL: u8 = 9;

/// Controller number of the damper/sustain pedal
const SUSTAIN_CC: u8 = 64;

const DEFAULT_US_PER_BEAT: u32 = 500_000;

#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub start_tick: u64,
    pub duration_ticks: u64,
    pub channel: u8,
}

impl NoteEvent {
    pub fn end_tick(&self) -> u64 {
        self.start_tick + self.duration_ticks
    }

    pub fn is_drum(&self) -> bool {
        self.channel == DRUM_CHANNEL
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEvent {
    pub tick: u64,
    pub microseconds_per_beat: u32,
}

/// Piecewise-linear tick -> seconds mapping.
///
/// Metrical timelines integrate over the tempo events of every track;
/// timecode timelines tick at a fixed rate and ignore tempo.
#[derive(Debug, Clone)]
pub struct TempoMap {
    clock: Clock,
    /// (tick, seconds at tick, microseconds per beat from tick on)
    segments: Vec<(u64, f64, f64)>,
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    Metrical { ticks_per_beat: f64 },
    Timecode { ticks_per_second: f64 },
}

impl TempoMap {
    /// `tempo_events` must be sorted by tick.
    pub fn new(timing: Timing, tempo_events: &[TempoEvent]) -> Self {
        let clock = match timing {
            Timing::Metrical(tpb) => Clock::Metrical {
                ticks_per_beat: f64::from(tpb.as_int().max(1)),
            },
            Timing::Timecode(fps, subframes) => Clock::Timecode {
                ticks_per_second: (f64::from(fps.as_f32()) * f64::from(subframes)).max(1.0),
            },
        };

        let mut segments = vec![(0u64, 0.0f64, f64::from(DEFAULT_US_PER_BEAT))];
        if let Clock::Metrical { ticks_per_beat } = clock {
            let (mut last_tick, mut last_secs, mut last_tempo) = segments[0];
            for te in tempo_events {
                let tempo = f64::from(te.microseconds_per_beat);
                if te.tick == last_tick {
                    // Later tempo at the same tick wins
                    last_tempo = tempo;
                    if let Some(seg) = segments.last_mut() {
                        seg.2 = tempo;
                    }
                    continue;
                }
                last_secs += ((te.tick - last_tick) as f64 / ticks_per_beat) * (last_tempo / 1_000_000.0);
                last_tick = te.tick;
                last_tempo = tempo;
                segments.push((last_tick, last_secs, last_tempo));
            }
        }

        Self { clock, segments }
    }

    /// Convert an absolute tick position to seconds.
    pub fn seconds(&self, tick: u64) -> f64 {
        match self.clock {
            Clock::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
            Clock::Metrical { ticks_per_beat } => {
                let idx = self.segments.partition_point(|seg| seg.0 <= tick).saturating_sub(1);
                let (seg_tick, seg_secs, seg_tempo) = self.segments[idx];
                seg_secs + ((tick - seg_tick) as f64 / ticks_per_beat) * (seg_tempo / 1_000_000.0)
            }
        }
    }
}

/// Notes and tempo information pulled out of a timeline
pub struct ParsedNotes {
    pub events: Vec<NoteEvent>,
    pub tempo_map: TempoMap,
}

impl ParsedNotes {
    /// Time in seconds at which the last note (drums included) ends.
    pub fn end_seconds(&self) -> f64 {
        self.events
            .iter()
            .map(|n| self.tempo_map.seconds(n.end_tick()))
            .fold(0.0, f64::max)
    }
}

/// Pair note-on/off events into notes, holding released notes while the
/// sustain pedal (CC64 >= `sustain_threshold`) is down on their channel.
pub fn extract_notes(timeline: &Timeline<'_>, sustain_threshold: u8) -> ParsedNotes {
    let mut notes: Vec<NoteEvent> = Vec::new();
    let mut tempo_events: Vec<TempoEvent> = Vec::new();

    for track in &timeline.tracks {
        let mut current_tick: u64 = 0;
        // Active notes: (pitch, channel) -> (velocity, start_tick)
        let mut active_notes: HashMap<(u8, u8), (u8, u64)> = HashMap::new();
        let mut sustain_on: HashMap<u8, bool> = HashMap::new();
        // Notes held by sustain pedal: channel -> { pitch -> (velocity, start_tick) }
        let mut sustained_notes: HashMap<u8, HashMap<u8, (u8, u64)>> = HashMap::new();

        for event in track {
            current_tick += u64::from(event.delta.as_int());

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                    tempo_events.push(TempoEvent {
                        tick: current_tick,
                        microseconds_per_beat: t.as_int(),
                    });
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            let pitch = key.as_int();
                            // Re-strike finalizes the held or sounding note first
                            if let Some(ch_sustained) = sustained_notes.get_mut(&ch) {
                                if let Some((old_vel, old_start)) = ch_sustained.remove(&pitch) {
                                    notes.push(make_note(pitch, old_vel, old_start, current_tick, ch));
                                }
                            }
                            if let Some((old_vel, old_start)) = active_notes.remove(&(pitch, ch)) {
                                notes.push(make_note(pitch, old_vel, old_start, current_tick, ch));
                            }
                            active_notes.insert((pitch, ch), (vel.as_int(), current_tick));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            finalize_note_off(
                                &mut active_notes,
                                &mut sustained_notes,
                                &sustain_on,
                                &mut notes,
                                key.as_int(),
                                ch,
                                current_tick,
                            );
                        }
                        MidiMessage::Controller { controller, value }
                            if controller.as_int() == SUSTAIN_CC =>
                        {
                            let is_on = value.as_int() >= sustain_threshold;
                            let was_on = sustain_on.get(&ch).copied().unwrap_or(false);
                            sustain_on.insert(ch, is_on);

                            // Pedal released: finalize everything it was holding
                            if was_on && !is_on {
                                if let Some(ch_sustained) = sustained_notes.remove(&ch) {
                                    for (pitch, (vel, start)) in ch_sustained {
                                        notes.push(make_note(pitch, vel, start, current_tick, ch));
                                    }
                                }
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        // Finalize anything still sounding at the end of the track
        for ((pitch, ch), (vel, start)) in active_notes.drain() {
            notes.push(make_note(pitch, vel, start, current_tick, ch));
        }
        for (ch, ch_sustained) in sustained_notes.drain() {
            for (pitch, (vel, start)) in ch_sustained {
                notes.push(make_note(pitch, vel, start, current_tick, ch));
            }
        }
    }

    // HashMap drain order is arbitrary; sort fully so output is reproducible
    notes.sort_by_key(|n| (n.start_tick, n.channel, n.pitch, n.duration_ticks, n.velocity));
    tempo_events.sort_by_key(|t| t.tick);

    ParsedNotes {
        events: notes,
        tempo_map: TempoMap::new(timeline.header.timing, &tempo_events),
    }
}

fn make_note(pitch: u8, velocity: u8, start: u64, end: u64, channel: u8) -> NoteEvent {
    NoteEvent {
        pitch,
        velocity,
        start_tick: start,
        duration_ticks: end.saturating_sub(start),
        channel,
    }
}

/// Handle a note-off event, respecting sustain pedal state.
fn finalize_note_off(
    active_notes: &mut HashMap<(u8, u8), (u8, u64)>,
    sustained_notes: &mut HashMap<u8, HashMap<u8, (u8, u64)>>,
    sustain_on: &HashMap<u8, bool>,
    notes: &mut Vec<NoteEvent>,
    pitch: u8,
    channel: u8,
    current_tick: u64,
) {
    if let Some((vel, start)) = active_notes.remove(&(pitch, channel)) {
        if sustain_on.get(&channel).copied().unwrap_or(false) {
            sustained_notes
                .entry(channel)
                .or_default()
                .insert(pitch, (vel, start));
        } else {
            notes.push(make_note(pitch, vel, start, current_tick, channel));
        }
    }
}
