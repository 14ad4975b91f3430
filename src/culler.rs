use crate::model::song::TimedNote;
use serde::{Deserialize, Serialize};

/// How far around the playhead notes stay relevant for rendering.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Window {
    pub lookbehind_seconds: f64,
    pub lookahead_seconds: f64,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            lookbehind_seconds: 8.0,
            lookahead_seconds: 15.0,
        }
    }
}

impl Window {
    pub fn is_valid(&self) -> bool {
        self.lookbehind_seconds.is_finite()
            && self.lookahead_seconds.is_finite()
            && self.lookbehind_seconds >= 0.0
            && self.lookahead_seconds >= 0.0
    }

    pub fn contains(&self, note: &TimedNote, now: f64) -> bool {
        note.end_seconds() >= now - self.lookbehind_seconds
            && note.start_seconds <= now + self.lookahead_seconds
    }
}

/// Notes overlapping `[now - lookbehind, now + lookahead]`, in input order.
///
/// `notes` must be ascending by start time; the far edge is found by binary
/// search and only the notes before it are scanned. A non-finite clock or an
/// invalid window yields nothing rather than failing the frame.
pub fn visible_notes<'a>(
    notes: &'a [TimedNote],
    now: f64,
    window: &Window,
) -> impl Iterator<Item = &'a TimedNote> + use<'a> {
    let valid = now.is_finite() && window.is_valid();
    let window = *window;

    let upper = if valid {
        let until = now + window.lookahead_seconds;
        notes.partition_point(|note| note.start_seconds <= until)
    } else {
        0
    };

    notes[..upper]
        .iter()
        .filter(move |note| window.contains(note, now))
}
