use crate::error::{ConveyorError, Result};
use crate::model::config::ViewConfig;
use crate::model::song::{NoteSpan, TimedNote};
use serde::{Deserialize, Serialize};

pub const BEATS_PER_BAR: f64 = 4.0;
const SIXTEENTHS_PER_BEAT: f64 = 4.0;
const SECONDS_PER_MINUTE: f64 = 60.0;

const FALLBACK_COLOR: &str = "stark-white";

/// Color per pitch class (`pitch % 12`). Classes not listed use `FALLBACK_COLOR`.
pub const PITCH_CLASS_COLORS: &[(u8, &str)] = &[
    (0, "neon-lime"),     // C
    (2, "neon-cyan"),     // D
    (4, "neon-pink"),     // E
    (5, "acid-yellow"),   // F
    (6, "hot-magenta"),   // F#
    (7, "electric-blue"), // G
    (9, "laser-orange"),  // A
    (11, "ultraviolet"),  // B
];

/// Symbolic note values in beats.
const DURATION_TOKENS: &[(&str, f64)] = &[
    ("1m", 4.0),
    ("1n", 4.0),
    ("whole", 4.0),
    ("2n", 2.0),
    ("half", 2.0),
    ("4n", 1.0),
    ("quarter", 1.0),
    ("8n", 0.5),
    ("eighth", 0.5),
    ("16n", 0.25),
    ("sixteenth", 0.25),
];

/// Minimum length in beats for each symbolic value when quantizing.
const QUANTIZE_STEPS: &[(f64, &str)] = &[
    (3.8, "1n"),
    (1.9, "2n"),
    (0.9, "4n"),
    (0.4, "8n"),
    (0.2, "16n"),
];

/// Sixteenths are written to a millionth.
const POSITION_PRECISION: f64 = 1e6;

pub fn beat_seconds(bpm: f64) -> f64 {
    SECONDS_PER_MINUTE / bpm
}

pub fn ticks_to_seconds(tick: u64, ticks_per_quarter: u16, bpm: f64) -> f64 {
    tick as f64 / ticks_per_quarter as f64 * beat_seconds(bpm)
}

pub fn seconds_to_pixels(seconds: f64, pixels_per_second: f64) -> f64 {
    seconds * pixels_per_second
}

/// Position in 4/4 at a fixed tempo. Components may be fractional.
pub fn bars_beats_sixteenths_to_seconds(bars: f64, beats: f64, sixteenths: f64, bpm: f64) -> f64 {
    let beat = beat_seconds(bpm);
    bars * BEATS_PER_BAR * beat + beats * beat + sixteenths * beat / SIXTEENTHS_PER_BEAT
}

/// Parses "bars:beats:sixteenths", e.g. "6:1:2" or "12:2.5:0".
pub fn parse_time_position(text: &str, bpm: f64) -> Result<f64> {
    let malformed = || ConveyorError::MalformedTimePosition(text.to_owned());

    let parts = text
        .split(':')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;

    let [bars, beats, sixteenths] = parts[..] else {
        return Err(malformed());
    };

    if [bars, beats, sixteenths]
        .iter()
        .any(|part| !part.is_finite() || *part < 0.0)
    {
        return Err(malformed());
    }

    Ok(bars_beats_sixteenths_to_seconds(bars, beats, sixteenths, bpm))
}

/// Writes `seconds` as "bars:beats:sixteenths" with whole bars and beats and
/// fractional sixteenths, so `parse_time_position` reads it back.
pub fn seconds_to_time_position(seconds: f64, bpm: f64) -> String {
    let seconds = if seconds > 0.0 { seconds } else { 0.0 };
    let total_beats = seconds / beat_seconds(bpm);

    let bars = (total_beats / BEATS_PER_BAR).floor();
    let beats = (total_beats - bars * BEATS_PER_BAR).floor();
    let sixteenths = (total_beats - bars * BEATS_PER_BAR - beats) * SIXTEENTHS_PER_BEAT;
    let sixteenths = (sixteenths * POSITION_PRECISION).round() / POSITION_PRECISION;

    format!("{}:{}:{}", bars, beats, sixteenths)
}

/// Snaps a length to a symbolic note value, shortest is a thirty-second.
pub fn seconds_to_duration_token(seconds: f64, bpm: f64) -> &'static str {
    let beats = seconds / beat_seconds(bpm);
    QUANTIZE_STEPS
        .iter()
        .find(|(min_beats, _)| beats >= *min_beats)
        .map(|(_, token)| *token)
        .unwrap_or("32n")
}

/// Converts a duration token to seconds at `bpm`.
///
/// Whole/half/quarter/eighth/sixteenth names resolve from a fixed table. Anything
/// else goes through [`parse_generic_duration`]; a token neither understands is an
/// error, never a zero-length note.
pub fn duration_to_seconds(token: &str, bpm: f64) -> Result<f64> {
    let trimmed = token.trim();
    let symbolic = DURATION_TOKENS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        .map(|(_, beats)| beats * beat_seconds(bpm));

    symbolic
        .or_else(|| parse_generic_duration(trimmed, bpm))
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .ok_or_else(|| ConveyorError::UnknownDurationToken(token.to_owned()))
}

/// Tone-style durations: `<n>n`, dotted `<n>n.`, triplet `<n>t`, measures `<n>m`,
/// "bars:beats:sixteenths", or a plain number of seconds.
pub fn parse_generic_duration(token: &str, bpm: f64) -> Option<f64> {
    let beat = beat_seconds(bpm);

    if token.contains(':') {
        return parse_time_position(token, bpm).ok();
    }

    if let Some(value) = token.strip_suffix("n.") {
        return note_value_beats(value).map(|beats| beats * 1.5 * beat);
    }
    if let Some(value) = token.strip_suffix('n') {
        return note_value_beats(value).map(|beats| beats * beat);
    }
    if let Some(value) = token.strip_suffix('t') {
        return note_value_beats(value).map(|beats| beats * 2.0 / 3.0 * beat);
    }
    if let Some(value) = token.strip_suffix('m') {
        return value
            .parse::<f64>()
            .ok()
            .map(|measures| measures * BEATS_PER_BAR * beat);
    }

    token.parse::<f64>().ok()
}

/// "8" in "8n" is an eighth of a whole note, i.e. half a beat.
fn note_value_beats(value: &str) -> Option<f64> {
    let divisor = value.parse::<u32>().ok().filter(|d| *d > 0)?;
    Some(BEATS_PER_BAR / divisor as f64)
}

/// Maps a pitch range onto a vertical band of the lane, in percent from the top.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct PitchBand {
    pub min_pitch: u8,
    pub max_pitch: u8,
    /// Offset for `min_pitch`.
    pub bottom_percent: f64,
    /// Offset for `max_pitch`.
    pub top_percent: f64,
}

impl Default for PitchBand {
    fn default() -> Self {
        Self {
            min_pitch: 50,
            max_pitch: 86,
            bottom_percent: 85.0,
            top_percent: 15.0,
        }
    }
}

pub fn pitch_to_vertical_percent(pitch: u8, band: &PitchBand) -> f64 {
    let span = band.max_pitch as f64 - band.min_pitch as f64;
    let ratio = if span > 0.0 {
        ((pitch as f64 - band.min_pitch as f64) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    band.bottom_percent + (band.top_percent - band.bottom_percent) * ratio
}

pub fn pitch_to_color(pitch: u8) -> &'static str {
    let class = pitch % 12;
    PITCH_CLASS_COLORS
        .iter()
        .find(|(c, _)| *c == class)
        .map(|(_, color)| *color)
        .unwrap_or(FALLBACK_COLOR)
}

pub fn span_to_timed_note(span: &NoteSpan, ticks_per_quarter: u16, bpm: f64) -> TimedNote {
    TimedNote {
        pitch: span.pitch,
        start_seconds: ticks_to_seconds(span.start_tick, ticks_per_quarter, bpm),
        duration_seconds: ticks_to_seconds(span.duration_tick, ticks_per_quarter, bpm),
        velocity: span.velocity,
    }
}

/// A note as the renderer draws it this frame.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RenderableNote {
    pub pitch: u8,
    pub name: String,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub left_pixel: f64,
    pub width_pixel: f64,
    pub vertical_offset_percent: f64,
    pub color_key: &'static str,
    /// The note is under the playhead.
    pub is_active: bool,
}

/// Places a note on the conveyor relative to the playhead at time `now`.
pub fn project_note(note: &TimedNote, now: f64, config: &ViewConfig) -> RenderableNote {
    let pps = config.pixels_per_second;

    RenderableNote {
        pitch: note.pitch,
        name: note.name(),
        start_seconds: note.start_seconds,
        duration_seconds: note.duration_seconds,
        left_pixel: config.playhead_px() + seconds_to_pixels(note.start_seconds - now, pps),
        width_pixel: seconds_to_pixels(note.duration_seconds, pps).max(config.min_note_width_px),
        vertical_offset_percent: pitch_to_vertical_percent(note.pitch, &config.pitch_band),
        color_key: pitch_to_color(note.pitch),
        is_active: note.is_sounding_at(now),
    }
}
