use crate::util::note_name;
use serde::{Deserialize, Serialize};

/// What a decoded track event means to the conveyor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8, velocity: u8 },
    TempoMeta { microseconds_per_beat: u32 },
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// Ticks since the previous event in the same track.
    pub delta_ticks: u32,
    pub kind: EventKind,
}

impl MidiEvent {
    pub fn new(delta_ticks: u32, kind: EventKind) -> Self {
        Self { delta_ticks, kind }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub name: Option<String>,
    pub events: Vec<MidiEvent>,
}

impl Track {
    pub fn new(events: Vec<MidiEvent>) -> Self {
        Self { name: None, events }
    }

    /// Absolute tick of the last event in the track.
    pub fn final_tick(&self) -> u64 {
        self.events
            .iter()
            .map(|event| event.delta_ticks as u64)
            .sum()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MidiDocument {
    pub format: u16,
    pub ticks_per_quarter: u16,
    pub tracks: Vec<Track>,
}

/// A resolved note-on/note-off pair, still on the tick clock.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NoteSpan {
    pub pitch: u8,
    pub start_tick: u64,
    pub duration_tick: u64,
    /// Normalized to `0.0..=1.0`.
    pub velocity: f64,
}

impl NoteSpan {
    pub fn name(&self) -> String {
        note_name(self.pitch)
    }
}

/// A note placed on the seconds timeline.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TimedNote {
    pub pitch: u8,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub velocity: f64,
}

impl TimedNote {
    pub fn name(&self) -> String {
        note_name(self.pitch)
    }

    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }

    pub fn is_sounding_at(&self, seconds: f64) -> bool {
        self.start_seconds <= seconds && seconds < self.end_seconds()
    }
}

/// One lane of the conveyor: a single track or sheet voice.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "UnsortedVoice")]
pub struct Voice {
    pub label: String,
    /// Ascending by `start_seconds`.
    pub notes: Vec<TimedNote>,
}

impl Voice {
    pub fn new(label: impl Into<String>, mut notes: Vec<TimedNote>) -> Self {
        notes.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));
        Self {
            label: label.into(),
            notes,
        }
    }

    pub fn end_seconds(&self) -> f64 {
        self.notes
            .iter()
            .map(TimedNote::end_seconds)
            .fold(0.0, f64::max)
    }
}

/// Wire form of a [`Voice`]. Notes are sorted on the way in.
#[derive(Deserialize)]
struct UnsortedVoice {
    label: String,
    notes: Vec<TimedNote>,
}

impl From<UnsortedVoice> for Voice {
    fn from(raw: UnsortedVoice) -> Self {
        Voice::new(raw.label, raw.notes)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub tempo_bpm: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Song {
    pub metadata: Metadata,
    pub voices: Vec<Voice>,
}

impl Song {
    pub fn note_count(&self) -> usize {
        self.voices.iter().map(|voice| voice.notes.len()).sum()
    }

    pub fn end_seconds(&self) -> f64 {
        self.voices
            .iter()
            .map(Voice::end_seconds)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deserialized_voice_is_sorted_by_start() {
        let voice: Voice = serde_json::from_str(
            r#"{
                "label": "lead",
                "notes": [
                    { "pitch": 64, "start_seconds": 2.0, "duration_seconds": 0.5, "velocity": 1.0 },
                    { "pitch": 60, "start_seconds": 0.0, "duration_seconds": 0.5, "velocity": 1.0 },
                    { "pitch": 62, "start_seconds": 1.0, "duration_seconds": 0.5, "velocity": 1.0 }
                ]
            }"#,
        )
        .unwrap();

        let pitches: Vec<u8> = voice.notes.iter().map(|note| note.pitch).collect();
        assert_eq!(pitches, vec![60, 62, 64]);
        assert_eq!(voice.end_seconds(), 2.5);
    }
}
