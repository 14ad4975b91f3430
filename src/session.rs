use crate::culler::visible_notes;
use crate::model::config::ViewConfig;
use crate::model::song::{Song, TimedNote};
use crate::timeline::{RenderableNote, project_note};
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

/// A note whose start time the clock has reached, handed to the sound engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundTrigger {
    pub voice: usize,
    pub pitch_name: String,
    pub duration_seconds: f64,
    pub velocity: f64,
    pub start_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceFrame {
    pub voice: usize,
    pub label: String,
    /// Name of the note under the playhead, while playing.
    pub active_note: Option<String>,
    pub notes: Vec<RenderableNote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub time_seconds: f64,
    pub state: PlaybackState,
    pub voices: Vec<VoiceFrame>,
}

impl Frame {
    pub fn note_count(&self) -> usize {
        self.voices.iter().map(|voice| voice.notes.len()).sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct QueuedNote {
    start_seconds: f64,
    voice: usize,
    note: usize,
}

/// Playback state for one loaded song.
///
/// The clock is written only through [`advance`](Self::advance) and never moves
/// backward while playing. Sound triggers come from a queue sorted by start time
/// and a cursor that only moves forward, so every note fires exactly once per run.
#[derive(Debug)]
pub struct PlaybackSession {
    song: Song,
    config: ViewConfig,
    state: PlaybackState,
    clock: f64,
    queue: Vec<QueuedNote>,
    cursor: usize,
    last_frame_at: Option<f64>,
}

impl PlaybackSession {
    pub fn new(song: Song, config: ViewConfig) -> Self {
        let mut queue: Vec<QueuedNote> = song
            .voices
            .iter()
            .enumerate()
            .flat_map(|(voice, v)| {
                v.notes.iter().enumerate().map(move |(note, n)| QueuedNote {
                    start_seconds: n.start_seconds,
                    voice,
                    note,
                })
            })
            .collect();

        // stable, so simultaneous notes fire in voice order
        queue.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));

        debug!("Session queue holds {} notes", queue.len());

        Self {
            song,
            config,
            state: PlaybackState::Stopped,
            clock: 0.0,
            queue,
            cursor: 0,
            last_frame_at: None,
        }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Starts from time 0. Returns false, changing nothing, when already playing.
    pub fn start(&mut self) -> bool {
        if self.state == PlaybackState::Playing {
            return false;
        }

        self.reset();
        self.state = PlaybackState::Playing;
        true
    }

    /// Halts and rewinds to time 0. Stopping a stopped session changes nothing.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.reset();
    }

    fn reset(&mut self) {
        self.clock = 0.0;
        self.cursor = 0;
        self.last_frame_at = None;
    }

    /// Moves the clock to `elapsed` seconds and pops every note it has reached.
    pub fn advance(&mut self, elapsed: f64) -> Vec<SoundTrigger> {
        if self.state != PlaybackState::Playing || !elapsed.is_finite() {
            return Vec::new();
        }

        if elapsed > self.clock {
            self.clock = elapsed;
        }

        let mut due: Vec<SoundTrigger> = Vec::new();
        while self.cursor < self.queue.len() {
            let queued = self.queue[self.cursor];
            if queued.start_seconds > self.clock {
                break;
            }

            let note = &self.song.voices[queued.voice].notes[queued.note];
            due.push(SoundTrigger {
                voice: queued.voice,
                pitch_name: note.name(),
                duration_seconds: note.duration_seconds,
                velocity: note.velocity,
                start_seconds: note.start_seconds,
            });
            self.cursor += 1;
        }

        due
    }

    /// A frame at the current clock, or `None` when the last one was less than a
    /// frame interval ago.
    pub fn frame(&mut self, elapsed: f64) -> Option<Frame> {
        if let Some(last) = self.last_frame_at
            && elapsed - last < self.config.frame_interval_seconds()
        {
            return None;
        }

        self.last_frame_at = Some(elapsed);
        Some(self.render_at(self.clock))
    }

    /// Culls and projects every voice for time `now`.
    pub fn render_at(&self, now: f64) -> Frame {
        let playing = self.state == PlaybackState::Playing;

        let voices = self
            .song
            .voices
            .iter()
            .enumerate()
            .map(|(idx, voice)| {
                let notes: Vec<RenderableNote> = visible_notes(&voice.notes, now, &self.config.window)
                    .map(|note| project_note(note, now, &self.config))
                    .collect();

                let active_note = if playing {
                    notes
                        .iter()
                        .rev()
                        .find(|note| note.is_active)
                        .map(|note| note.name.clone())
                } else {
                    None
                };

                VoiceFrame {
                    voice: idx,
                    label: voice.label.clone(),
                    active_note,
                    notes,
                }
            })
            .collect();

        Frame {
            time_seconds: now,
            state: self.state,
            voices,
        }
    }

    /// Notes sounding at the current clock. Always empty when stopped.
    pub fn sounding_notes(&self) -> Vec<(usize, &TimedNote)> {
        if self.state != PlaybackState::Playing {
            return Vec::new();
        }

        let clock = self.clock;
        self.song
            .voices
            .iter()
            .enumerate()
            .flat_map(|(idx, voice)| {
                voice
                    .notes
                    .iter()
                    .filter(move |note| note.is_sounding_at(clock))
                    .map(move |note| (idx, note))
            })
            .collect()
    }

    /// Every note has fired and the last one has finished.
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.queue.len() && self.clock >= self.song.end_seconds()
    }
}
