use crate::model::song::{EventKind, MidiDocument};
use log::debug;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MPQN: u32 = 500_000;
const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

/// The single global tempo of a document.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tempo {
    pub microseconds_per_beat: u32,
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            microseconds_per_beat: DEFAULT_MPQN,
        }
    }
}

impl Tempo {
    pub fn beats_per_minute(&self) -> f64 {
        MICROSECONDS_PER_MINUTE / self.microseconds_per_beat as f64
    }
}

/// Takes the first tempo event of track 0, or 120 BPM when there is none.
///
/// Tempo changes are not followed: every later tempo event is ignored, so all
/// tick to second conversions use one BPM for the whole piece.
pub fn resolve_tempo(doc: &MidiDocument) -> Tempo {
    let Some(conductor) = doc.tracks.first() else {
        return Tempo::default();
    };

    let mut tempos = conductor.events.iter().filter_map(|event| match event.kind {
        EventKind::TempoMeta {
            microseconds_per_beat,
        } if microseconds_per_beat > 0 => Some(microseconds_per_beat),
        _ => None,
    });

    let Some(microseconds_per_beat) = tempos.next() else {
        debug!("No tempo event in track 0, defaulting to 120 BPM");
        return Tempo::default();
    };

    let ignored = tempos.count();
    if ignored > 0 {
        debug!(
            "Ignoring {} later tempo change(s), only the first tempo is honored",
            ignored
        );
    }

    let tempo = Tempo {
        microseconds_per_beat,
    };
    debug!(
        "Tempo: {} us/qn ({:.3} BPM)",
        microseconds_per_beat,
        tempo.beats_per_minute()
    );
    tempo
}
