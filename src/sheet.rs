//! Hand-authored note lists on a bars:beats:sixteenths timeline.
//!
//! ```json
//! {
//!   "title": "Canon in D",
//!   "bpm": 96,
//!   "voices": [
//!     { "label": "VOICE_I", "notes": [ { "time": "0:0:0", "note": "F#5", "duration": "2n" } ] },
//!     { "label": "VOICE_II", "offset": "2:0:0", "notes": [] }
//!   ]
//! }
//! ```

use crate::error::{ConveyorError, Result};
use crate::model::song::{Metadata, Song, TimedNote, Voice};
use crate::timeline::{
    duration_to_seconds, parse_time_position, seconds_to_duration_token, seconds_to_time_position,
};
use crate::util::parse_note_name;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_SHEET_BPM: f64 = 96.0;
const DEFAULT_VELOCITY: f64 = 1.0;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NoteRecord {
    /// "bars:beats:sixteenths"
    pub time: String,
    pub note: String,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SheetVoice {
    #[serde(default)]
    pub label: Option<String>,
    /// Entry point of the voice, added to every note time. Canon voices use this.
    #[serde(default)]
    pub offset: Option<String>,
    pub notes: Vec<NoteRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NoteSheet {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    pub voices: Vec<SheetVoice>,
}

fn default_bpm() -> f64 {
    DEFAULT_SHEET_BPM
}

pub fn load_note_sheet<P: AsRef<Path>>(path: P) -> Result<NoteSheet> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConveyorError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_note_sheet(&text)
}

pub fn parse_note_sheet(text: &str) -> Result<NoteSheet> {
    let sheet: NoteSheet = serde_json::from_str(text)?;
    if !sheet.bpm.is_finite() || sheet.bpm <= 0.0 {
        return Err(ConveyorError::InvalidTempo(sheet.bpm));
    }

    Ok(sheet)
}

pub fn record_to_timed_note(record: &NoteRecord, bpm: f64, offset_seconds: f64) -> Result<TimedNote> {
    let pitch = parse_note_name(&record.note)?;
    let start_seconds = parse_time_position(&record.time, bpm)? + offset_seconds;
    let duration_seconds = duration_to_seconds(&record.duration, bpm)?;

    Ok(TimedNote {
        pitch,
        start_seconds,
        duration_seconds,
        velocity: record
            .velocity
            .filter(|velocity| velocity.is_finite())
            .unwrap_or(DEFAULT_VELOCITY)
            .clamp(0.0, 1.0),
    })
}

/// Places every record on the seconds timeline. A record that cannot be resolved
/// is skipped with a warning and the rest of its voice still loads. A voice whose
/// offset cannot be resolved is skipped as a whole.
pub fn sheet_to_song(sheet: &NoteSheet) -> Result<Song> {
    let bpm = sheet.bpm;
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(ConveyorError::InvalidTempo(bpm));
    }

    let mut voices: Vec<Voice> = Vec::new();
    for (idx, sheet_voice) in sheet.voices.iter().enumerate() {
        let label = sheet_voice
            .label
            .clone()
            .unwrap_or_else(|| format!("Voice {}", idx + 1));

        let offset_seconds = match sheet_voice.offset.as_deref().map(|o| parse_time_position(o, bpm)) {
            Some(Ok(offset)) => offset,
            Some(Err(why)) => {
                warn!("Skipping voice '{}', bad offset: {}", label, why);
                continue;
            }
            None => 0.0,
        };

        let mut notes: Vec<TimedNote> = Vec::with_capacity(sheet_voice.notes.len());
        for (n, record) in sheet_voice.notes.iter().enumerate() {
            match record_to_timed_note(record, bpm, offset_seconds) {
                Ok(note) => notes.push(note),
                Err(why) => warn!("Skipping note {} of '{}': {}", n, label, why),
            }
        }

        if notes.is_empty() {
            debug!("Voice '{}' has no playable notes, skipping", label);
            continue;
        }

        voices.push(Voice::new(label, notes));
    }

    Ok(Song {
        metadata: Metadata {
            title: sheet.title.clone(),
            tempo_bpm: bpm,
        },
        voices,
    })
}

/// How exported records spell their durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationStyle {
    /// Exact length in seconds, e.g. "1.488".
    #[default]
    Seconds,
    /// Nearest symbolic value, e.g. "8n". Lossy.
    Quantized,
}

/// Writes a song back out as a note sheet at `bpm`.
///
/// Everything is shifted so the earliest note of the song lands on "0:0:0";
/// voices keep their relative alignment and carry no offset.
pub fn song_to_note_sheet(song: &Song, bpm: f64, style: DurationStyle) -> Result<NoteSheet> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(ConveyorError::InvalidTempo(bpm));
    }

    let origin = song
        .voices
        .iter()
        .filter_map(|voice| voice.notes.first())
        .map(|note| note.start_seconds)
        .fold(f64::INFINITY, f64::min);
    let origin = if origin.is_finite() { origin } else { 0.0 };

    debug!("Exporting sheet at {:.3} BPM, first note at {:.3}s", bpm, origin);

    let voices = song
        .voices
        .iter()
        .map(|voice| SheetVoice {
            label: Some(voice.label.clone()),
            offset: None,
            notes: voice
                .notes
                .iter()
                .map(|note| NoteRecord {
                    time: seconds_to_time_position(note.start_seconds - origin, bpm),
                    note: note.name(),
                    duration: match style {
                        DurationStyle::Seconds => note.duration_seconds.to_string(),
                        DurationStyle::Quantized => {
                            seconds_to_duration_token(note.duration_seconds, bpm).to_owned()
                        }
                    },
                    velocity: Some(note.velocity),
                })
                .collect(),
        })
        .collect();

    Ok(NoteSheet {
        title: song.metadata.title.clone(),
        bpm,
        voices,
    })
}

pub fn save_note_sheet<P: AsRef<Path>>(path: P, sheet: &NoteSheet) -> Result<()> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(sheet)?;
    fs::write(path, text).map_err(|source| ConveyorError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "Wrote {} voice(s) to '{}'",
        sheet.voices.len(),
        path.display()
    );
    Ok(())
}
