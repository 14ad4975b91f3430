use crate::error::{ConveyorError, Result};
use crate::extractor::extract_note_spans;
use crate::model::song::{EventKind, Metadata, MidiDocument, MidiEvent, Song, Track, Voice};
use crate::tempo::resolve_tempo;
use crate::timeline::span_to_timed_note;
use log::{debug, info};
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::fs;
use std::path::Path;

const HEADER_CHUNK: &[u8; 4] = b"MThd";
const TRACK_CHUNK: &[u8; 4] = b"MTrk";
const HEADER_LENGTH: usize = 6;
const CHUNK_PREFIX_LENGTH: usize = 8;

pub fn import_midi_file<P: AsRef<Path>>(path: P) -> Result<MidiDocument> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| ConveyorError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    read_midi_bytes(&bytes)
}

/// Reads, decodes and places every track of a MIDI file on the seconds timeline.
pub fn import_midi_song<P: AsRef<Path>>(path: P) -> Result<Song> {
    let path = path.as_ref();
    let doc = import_midi_file(path)?;
    let title = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string());

    Ok(midi_document_to_song(&doc, title))
}

/// One voice per track that has at least one complete note, all at the tempo of track 0.
pub fn midi_document_to_song(doc: &MidiDocument, title: Option<String>) -> Song {
    let tempo = resolve_tempo(doc);
    let bpm = tempo.beats_per_minute();

    let mut voices: Vec<Voice> = Vec::new();
    for (track_idx, track) in doc.tracks.iter().enumerate() {
        let spans = extract_note_spans(track);
        if spans.is_empty() {
            debug!("Track {}: no notes, skipping", track_idx);
            continue;
        }

        let label = track
            .name
            .clone()
            .unwrap_or_else(|| format!("Track {}", track_idx));

        debug!("Track {} ('{}'): {} notes", track_idx, label, spans.len());

        let notes = spans
            .iter()
            .map(|span| span_to_timed_note(span, doc.ticks_per_quarter, bpm))
            .collect();
        voices.push(Voice::new(label, notes));
    }

    info!(
        "Built {} voice(s) at {:.3} BPM from {} track(s)",
        voices.len(),
        bpm,
        doc.tracks.len()
    );

    Song {
        metadata: Metadata {
            title,
            tempo_bpm: bpm,
        },
        voices,
    }
}

/// Decodes a Standard MIDI File. Any structural violation fails the whole load.
pub fn read_midi_bytes(bytes: &[u8]) -> Result<MidiDocument> {
    validate_chunks(bytes)?;

    let smf = Smf::parse(bytes).map_err(|e| malformed(format!("{}", e)))?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(t) => t.as_int(),
        Timing::Timecode(_fps, _subframe) => {
            return Err(malformed("SMPTE timecode division is not supported"));
        }
    };

    let format = match smf.header.format {
        Format::SingleTrack => 0,
        Format::Parallel => 1,
        Format::Sequential => 2,
    };

    debug!(
        "MIDI format: {}, tracks: {}, ticks per quarter note: {}",
        format,
        smf.tracks.len(),
        ticks_per_quarter
    );

    let tracks = smf
        .tracks
        .iter()
        .enumerate()
        .map(|(track_idx, raw)| {
            let end = raw
                .iter()
                .position(|event| matches!(event.kind, TrackEventKind::Meta(MetaMessage::EndOfTrack)));
            if let Some(end) = end
                && end + 1 != raw.len()
            {
                return Err(malformed(format!(
                    "track {} has {} event(s) after its End-of-Track",
                    track_idx,
                    raw.len() - end - 1
                )));
            }

            let mut track = Track::default();
            for event in raw.iter() {
                track.events.push(convert_event(event, &mut track.name));
            }
            Ok(track)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MidiDocument {
        format,
        ticks_per_quarter,
        tracks,
    })
}

fn convert_event(event: &TrackEvent, track_name: &mut Option<String>) -> MidiEvent {
    let kind = match &event.kind {
        TrackEventKind::Midi { channel, message } => match message {
            MidiMessage::NoteOn { key, vel } => EventKind::NoteOn {
                channel: channel.as_int(),
                pitch: key.as_int(),
                velocity: vel.as_int(),
            },
            MidiMessage::NoteOff { key, vel } => EventKind::NoteOff {
                channel: channel.as_int(),
                pitch: key.as_int(),
                velocity: vel.as_int(),
            },
            _ => EventKind::Other,
        },
        TrackEventKind::Meta(meta) => match meta {
            MetaMessage::Tempo(micro) => EventKind::TempoMeta {
                microseconds_per_beat: micro.as_int(),
            },
            MetaMessage::TrackName(bytes) => {
                if track_name.is_none() {
                    let name = String::from_utf8_lossy(bytes).trim().to_owned();
                    if !name.is_empty() {
                        debug!("Track name: {}", name);
                        *track_name = Some(name);
                    }
                }
                EventKind::Other
            }
            _ => EventKind::Other,
        },
        _ => EventKind::Other,
    };

    MidiEvent::new(event.delta.as_int(), kind)
}

/// Walks the chunk framing so a bad header or a track whose declared length
/// disagrees with the data is reported before any event is decoded.
fn validate_chunks(bytes: &[u8]) -> Result<()> {
    if bytes.len() < CHUNK_PREFIX_LENGTH + HEADER_LENGTH || !bytes.starts_with(HEADER_CHUNK) {
        return Err(malformed("missing MThd header chunk"));
    }

    let header_length = read_u32(&bytes[4..8]) as usize;
    if header_length != HEADER_LENGTH {
        return Err(malformed(format!(
            "header chunk length is {}, expected {}",
            header_length, HEADER_LENGTH
        )));
    }

    let declared_tracks = u16::from_be_bytes([bytes[10], bytes[11]]);
    let division = u16::from_be_bytes([bytes[12], bytes[13]]);

    if division & 0x8000 != 0 {
        return Err(malformed("SMPTE timecode division is not supported"));
    }
    if division == 0 {
        return Err(malformed("ticks per quarter note must be greater than zero"));
    }

    let mut offset = CHUNK_PREFIX_LENGTH + HEADER_LENGTH;
    let mut found_tracks: u16 = 0;

    while offset < bytes.len() {
        if bytes.len() - offset < CHUNK_PREFIX_LENGTH {
            return Err(malformed(format!("truncated chunk header at byte {}", offset)));
        }

        let id = &bytes[offset..offset + 4];
        let length = read_u32(&bytes[offset + 4..offset + 8]) as usize;
        let body_start = offset + CHUNK_PREFIX_LENGTH;
        let available = bytes.len() - body_start;

        if length > available {
            return Err(malformed(format!(
                "chunk at byte {} declares {} bytes but only {} remain",
                offset, length, available
            )));
        }

        if id == &TRACK_CHUNK[..] {
            found_tracks = found_tracks.saturating_add(1);
        } else {
            debug!(
                "Skipping unknown chunk '{}' at byte {}",
                String::from_utf8_lossy(id),
                offset
            );
        }

        offset = body_start + length;
    }

    if found_tracks != declared_tracks {
        return Err(malformed(format!(
            "header declares {} tracks but {} were found",
            declared_tracks, found_tracks
        )));
    }

    Ok(())
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn malformed(reason: impl Into<String>) -> ConveyorError {
    ConveyorError::MalformedMidi(reason.into())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fixtures::{TrackBuilder, smf_bytes, vlq};

    #[test]
    fn decodes_header_and_events() {
        env_logger::try_init().unwrap_or(());

        let conductor = TrackBuilder::new().name("Conductor").tempo(0, 600_000).build();
        let voice = TrackBuilder::new()
            .note_on(0, 60, 100)
            .note_off(240, 60)
            .build();

        let doc = read_midi_bytes(&smf_bytes(480, &[conductor, voice])).unwrap();

        assert_eq!(doc.format, 1);
        assert_eq!(doc.ticks_per_quarter, 480);
        assert_eq!(doc.tracks.len(), 2);
        assert_eq!(doc.tracks[0].name.as_deref(), Some("Conductor"));
        assert!(doc.tracks[0].events.contains(&MidiEvent::new(
            0,
            EventKind::TempoMeta {
                microseconds_per_beat: 600_000
            }
        )));

        let notes: Vec<_> = doc.tracks[1]
            .events
            .iter()
            .filter(|e| e.kind != EventKind::Other)
            .copied()
            .collect();
        assert_eq!(
            notes,
            vec![
                MidiEvent::new(
                    0,
                    EventKind::NoteOn {
                        channel: 0,
                        pitch: 60,
                        velocity: 100
                    }
                ),
                MidiEvent::new(
                    240,
                    EventKind::NoteOff {
                        channel: 0,
                        pitch: 60,
                        velocity: 0
                    }
                ),
            ]
        );
    }

    #[test]
    fn multi_byte_delta_times() {
        env_logger::try_init().unwrap_or(());

        assert_eq!(vlq(0x4000), vec![0x81, 0x80, 0x00]);

        let voice = TrackBuilder::new()
            .note_on(200, 64, 90)
            .note_off(0x4000, 64)
            .build();
        let doc = read_midi_bytes(&smf_bytes(96, &[voice])).unwrap();

        assert_eq!(doc.tracks[0].events[0].delta_ticks, 200);
        assert_eq!(doc.tracks[0].events[1].delta_ticks, 0x4000);
        assert_eq!(doc.tracks[0].final_tick(), 200 + 0x4000);
    }

    #[test]
    fn running_status_and_zero_velocity_note_on() {
        env_logger::try_init().unwrap_or(());

        // 90 3C 64, then running status 3C 00 after 120 ticks
        let body = vec![
            0x00, 0x90, 0x3C, 0x64, 0x78, 0x3C, 0x00, 0x00, 0xFF, 0x2F, 0x00,
        ];
        let doc = read_midi_bytes(&smf_bytes(480, &[body])).unwrap();

        assert_eq!(
            doc.tracks[0].events[1],
            MidiEvent::new(
                120,
                EventKind::NoteOn {
                    channel: 0,
                    pitch: 60,
                    velocity: 0
                }
            )
        );
    }

    #[test]
    fn rejects_missing_header() {
        let result = read_midi_bytes(b"RIFF\x00\x00\x00\x06\x00\x01\x00\x01\x01\xE0");
        assert!(matches!(result, Err(ConveyorError::MalformedMidi(_))));

        assert!(matches!(
            read_midi_bytes(&[]),
            Err(ConveyorError::MalformedMidi(_))
        ));
    }

    #[test]
    fn rejects_wrong_header_length() {
        let mut bytes = smf_bytes(480, &[TrackBuilder::new().build()]);
        bytes[7] = 7;
        assert!(matches!(
            read_midi_bytes(&bytes),
            Err(ConveyorError::MalformedMidi(_))
        ));
    }

    #[test]
    fn rejects_track_length_past_end_of_data() {
        let mut bytes = smf_bytes(480, &[TrackBuilder::new().note_on(0, 60, 1).build()]);
        // Declared track length lives at bytes 18..22.
        bytes[21] = bytes[21].wrapping_add(10);
        assert!(matches!(
            read_midi_bytes(&bytes),
            Err(ConveyorError::MalformedMidi(_))
        ));
    }

    #[test]
    fn rejects_events_after_end_of_track() {
        env_logger::try_init().unwrap_or(());

        let mut body = TrackBuilder::new()
            .note_on(0, 60, 100)
            .note_off(96, 60)
            .build();
        body.extend_from_slice(&[0x00, 0x90, 0x40, 0x40]);

        assert!(matches!(
            read_midi_bytes(&smf_bytes(480, &[body])),
            Err(ConveyorError::MalformedMidi(_))
        ));
    }

    #[test]
    fn rejects_track_shorter_than_declared_count() {
        let mut bytes = smf_bytes(
            480,
            &[TrackBuilder::new().build(), TrackBuilder::new().build()],
        );
        bytes[11] = 3;
        assert!(matches!(
            read_midi_bytes(&bytes),
            Err(ConveyorError::MalformedMidi(_))
        ));

        let mut truncated = smf_bytes(480, &[TrackBuilder::new().build()]);
        truncated.extend_from_slice(b"MTr");
        assert!(matches!(
            read_midi_bytes(&truncated),
            Err(ConveyorError::MalformedMidi(_))
        ));
    }

    #[test]
    fn rejects_smpte_and_zero_division() {
        let mut smpte = smf_bytes(480, &[TrackBuilder::new().build()]);
        smpte[12] = 0xE7;
        smpte[13] = 0x28;
        assert!(matches!(
            read_midi_bytes(&smpte),
            Err(ConveyorError::MalformedMidi(_))
        ));

        let zero = smf_bytes(0, &[TrackBuilder::new().build()]);
        assert!(matches!(
            read_midi_bytes(&zero),
            Err(ConveyorError::MalformedMidi(_))
        ));
    }

    #[test]
    fn skips_unknown_chunks() {
        env_logger::try_init().unwrap_or(());

        let mut bytes = smf_bytes(480, &[TrackBuilder::new().note_on(0, 60, 1).build()]);
        let mut extra = b"XFIH".to_vec();
        extra.extend_from_slice(&2u32.to_be_bytes());
        extra.extend_from_slice(&[0xAB, 0xCD]);
        bytes.extend_from_slice(&extra);

        let doc = read_midi_bytes(&bytes).unwrap();
        assert_eq!(doc.tracks.len(), 1);
    }

    #[test]
    fn builds_one_voice_per_playable_track() {
        env_logger::try_init().unwrap_or(());

        // 1_000_000 us per beat = 60 BPM
        let conductor = TrackBuilder::new().tempo(0, 1_000_000).tempo(480, 250_000).build();
        let violin = TrackBuilder::new()
            .name("Violino I")
            .note_on(480, 78, 127)
            .note_off(960, 78)
            .build();
        let unfinished = TrackBuilder::new().note_on(0, 50, 100).build();
        let bass = TrackBuilder::new()
            .note_on(0, 50, 100)
            .note_off(240, 50)
            .build();

        let doc = read_midi_bytes(&smf_bytes(480, &[conductor, violin, unfinished, bass])).unwrap();
        let song = midi_document_to_song(&doc, Some("canon.mid".into()));

        assert!((song.metadata.tempo_bpm - 60.0).abs() < 1e-9);
        assert_eq!(song.voices.len(), 2);
        assert_eq!(song.voices[0].label, "Violino I");
        assert_eq!(song.voices[1].label, "Track 3");

        let note = song.voices[0].notes[0];
        assert!((note.start_seconds - 1.0).abs() < 1e-9);
        assert!((note.duration_seconds - 2.0).abs() < 1e-9);
        assert_eq!(note.velocity, 1.0);
        assert_eq!(song.note_count(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = import_midi_file("./does/not/exist.mid");
        assert!(matches!(result, Err(ConveyorError::Io { .. })));
    }
}
