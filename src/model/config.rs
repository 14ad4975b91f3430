use crate::culler::Window;
use crate::error::{ConveyorError, Result};
use crate::timeline::PitchBand;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "midi_conveyor",
    about = "Scroll a MIDI file or note sheet past a playhead, conveyor-belt style."
)]
pub struct Args {
    /// Path to a Standard MIDI File (.mid/.midi) or a JSON note sheet (.json).
    pub input: PathBuf,

    /// Optional JSON file with view settings. Flags below override it.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tempo of a note sheet, or of an exported sheet, in beats per minute.
    #[arg(long)]
    pub bpm: Option<f64>,

    /// Horizontal scroll speed.
    #[arg(long = "pixels-per-second")]
    pub pixels_per_second: Option<f64>,

    /// Seconds of already-played notes kept on screen.
    #[arg(long)]
    pub lookbehind: Option<f64>,

    /// Seconds of upcoming notes kept on screen.
    #[arg(long)]
    pub lookahead: Option<f64>,

    /// Dry run (print the first dry_run_max notes of every voice and exit).
    #[arg(short, long, default_value_t = false)]
    pub dry_run: bool,

    /// Maximum notes per voice to print in dry run.
    #[arg(long, default_value_t = 40)]
    pub dry_run_max: usize,

    /// Writes the loaded song as a JSON note sheet to PATH and exits.
    #[arg(long = "export-sheet", value_name = "PATH")]
    pub export_sheet: Option<PathBuf>,

    /// With --export-sheet, snap durations to note values (1n..32n) instead of seconds.
    #[arg(long, default_value_t = false)]
    pub quantize: bool,

    /// Logs every rendered frame, not just sound triggers.
    #[arg(short, long)]
    pub verbose: bool,

    /// Delays the start of playback by N seconds.
    #[arg(long = "delay-start", default_value_t = 0)]
    pub delay_start: u64,
}

/// Everything that shapes the render space. Recomputing a frame only needs this
/// and the clock.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    pub pixels_per_second: f64,
    pub viewport_width_px: f64,
    /// Fraction of the viewport width where the playhead sits.
    pub playhead_ratio: f64,
    pub min_note_width_px: f64,
    pub frame_interval_ms: f64,
    pub window: Window,
    pub pitch_band: PitchBand,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            pixels_per_second: 100.0,
            viewport_width_px: 1280.0,
            playhead_ratio: 0.3,
            min_note_width_px: 2.0,
            frame_interval_ms: 16.0,
            window: Window::default(),
            pitch_band: PitchBand::default(),
        }
    }
}

impl ViewConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConveyorError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(serde_json::from_str(&text)?)
    }

    /// Applies command line overrides on top of the loaded settings.
    pub fn with_args(mut self, args: &Args) -> Self {
        if let Some(pps) = args.pixels_per_second {
            self.pixels_per_second = pps;
        }
        if let Some(lookbehind) = args.lookbehind {
            self.window.lookbehind_seconds = lookbehind;
        }
        if let Some(lookahead) = args.lookahead {
            self.window.lookahead_seconds = lookahead;
        }
        self
    }

    pub fn playhead_px(&self) -> f64 {
        self.viewport_width_px * self.playhead_ratio
    }

    pub fn frame_interval_seconds(&self) -> f64 {
        self.frame_interval_ms / 1000.0
    }
}
