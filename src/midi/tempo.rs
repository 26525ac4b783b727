// Tempo normalization: pin every tempo event to one value

use midly::num::u24;
use midly::{MetaMessage, TrackEvent, TrackEventKind};

use super::timeline::Timeline;

/// Return a copy of `timeline` whose tempo events all carry `us_per_beat`.
///
/// Header, track count, event order and delta ticks are untouched, so only
/// playback speed changes. `us_per_beat` is truncated to 24 bits; callers
/// validate it through `FeatureConfig::validate`.
pub fn normalize_tempo<'a>(timeline: &Timeline<'a>, us_per_beat: u32) -> Timeline<'a> {
    let tempo = u24::new(us_per_beat);

    let tracks = timeline
        .tracks
        .iter()
        .map(|track| {
            track
                .iter()
                .map(|event| match event.kind {
                    TrackEventKind::Meta(MetaMessage::Tempo(_)) => TrackEvent {
                        delta: event.delta,
                        kind: TrackEventKind::Meta(MetaMessage::Tempo(tempo)),
                    },
                    _ => *event,
                })
                .collect()
        })
        .collect();

    Timeline {
        header: timeline.header,
        tracks,
    }
}
