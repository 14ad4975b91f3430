use crate::error::{ConveyorError, Result};

const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Scientific pitch name for a MIDI note number, where 60 is "C4".
pub fn note_name(pitch: u8) -> String {
    let class = PITCH_CLASS_NAMES[(pitch % 12) as usize];
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", class, octave)
}

/// Parses names like "F#5", "Bb3" or "C-1" back into a MIDI note number.
pub fn parse_note_name(input: &str) -> Result<u8> {
    let unknown = || ConveyorError::UnknownNoteName(input.to_owned());
    let trimmed = input.trim();
    let mut chars = trimmed.chars();

    let base: i32 = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('C') => 0,
        Some('D') => 2,
        Some('E') => 4,
        Some('F') => 5,
        Some('G') => 7,
        Some('A') => 9,
        Some('B') => 11,
        _ => return Err(unknown()),
    };

    let rest = chars.as_str();
    let (accidental, octave_str) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };

    let octave: i32 = octave_str.parse().map_err(|_| unknown())?;
    let midi = (octave + 1) * 12 + base + accidental;

    if !(0..=127).contains(&midi) {
        return Err(unknown());
    }

    Ok(midi as u8)
}
