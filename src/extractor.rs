use crate::model::song::{EventKind, NoteSpan, Track};
use log::debug;
use std::collections::HashMap;

/// Pitch -> (start tick, raw velocity) for notes currently sounding on one track.
type SoundingNotes = HashMap<u8, (u64, u8)>;

const MAX_VELOCITY: f64 = 127.0;

/// Pairs note-on/note-off events of a single track into spans, ordered by start tick.
///
/// Pairing is track-scoped: two channels interleaving the same pitch within one
/// track share a slot. A note-on for a pitch that is already sounding closes the
/// earlier span first. Notes still sounding at the end of the track are dropped.
pub fn extract_note_spans(track: &Track) -> Vec<NoteSpan> {
    let mut sounding: SoundingNotes = HashMap::new();
    let mut spans: Vec<NoteSpan> = Vec::new();
    let mut abs_tick: u64 = 0;

    for event in track.events.iter() {
        abs_tick = abs_tick.saturating_add(event.delta_ticks as u64);

        match event.kind {
            EventKind::NoteOn {
                pitch, velocity, ..
            } if velocity > 0 => {
                if sounding.contains_key(&pitch) {
                    debug!(
                        "Re-triggered pitch {} at tick {} without a note-off, closing the previous span",
                        pitch, abs_tick
                    );
                    close_note(&mut sounding, &mut spans, pitch, abs_tick);
                }
                sounding.insert(pitch, (abs_tick, velocity));
            }
            // A note-on with velocity 0 is a note-off.
            EventKind::NoteOn { pitch, .. } | EventKind::NoteOff { pitch, .. } => {
                close_note(&mut sounding, &mut spans, pitch, abs_tick);
            }
            _ => {}
        }
    }

    for (pitch, (start_tick, _)) in sounding.iter() {
        debug!(
            "Dropping pitch {} opened at tick {} that never received a note-off",
            pitch, start_tick
        );
    }

    spans.sort_by_key(|span| span.start_tick);
    spans
}

fn close_note(sounding: &mut SoundingNotes, spans: &mut Vec<NoteSpan>, pitch: u8, abs_tick: u64) {
    let Some((start_tick, velocity)) = sounding.remove(&pitch) else {
        debug!("Orphaned note-off for pitch {} at tick {}", pitch, abs_tick);
        return;
    };

    let duration_tick = abs_tick.saturating_sub(start_tick);
    if duration_tick == 0 {
        debug!(
            "Skipping zero-length note for pitch {} at tick {}",
            pitch, start_tick
        );
        return;
    }

    spans.push(NoteSpan {
        pitch,
        start_tick,
        duration_tick,
        velocity: velocity as f64 / MAX_VELOCITY,
    });
}
