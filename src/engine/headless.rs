use crate::engine::{FrameRenderer, SoundEngine};
use crate::session::{Frame, SoundTrigger};
use log::{debug, info};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Headless engine: logs each note instead of sounding it, and summarizes frames.
#[derive(Debug, Default)]
pub struct LogEngine {
    verbose: bool,
    triggered: AtomicUsize,
}

impl LogEngine {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            triggered: AtomicUsize::new(0),
        }
    }

    /// Notes triggered since the last release.
    pub fn triggered(&self) -> usize {
        self.triggered.load(Ordering::Relaxed)
    }
}

impl SoundEngine for LogEngine {
    fn trigger(&self, trigger: &SoundTrigger) -> anyhow::Result<()> {
        self.triggered.fetch_add(1, Ordering::Relaxed);
        info!(
            "{:>4} | voice {} | at {:>9.3}s | duration: {:>7.3}s | velocity: {:.2}",
            trigger.pitch_name,
            trigger.voice,
            trigger.start_seconds,
            trigger.duration_seconds,
            trigger.velocity
        );
        Ok(())
    }

    fn release_all(&self) -> anyhow::Result<()> {
        let released = self.triggered.swap(0, Ordering::Relaxed);
        debug!("Releasing all notes ({} triggered)", released);
        Ok(())
    }
}

impl FrameRenderer for LogEngine {
    fn render(&self, frame: &Frame) {
        if !self.verbose {
            return;
        }

        let lanes = frame
            .voices
            .iter()
            .map(|voice| {
                format!(
                    "{}[{}]={}",
                    voice.label,
                    voice.notes.len(),
                    voice.active_note.as_deref().unwrap_or("-")
                )
            })
            .collect::<Vec<_>>()
            .join(" ");

        info!("{:>9.3}s | {}", frame.time_seconds, lanes);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_until_released() {
        env_logger::try_init().unwrap_or(());

        let engine = LogEngine::new(true);
        let trigger = SoundTrigger {
            voice: 0,
            pitch_name: "F#5".into(),
            duration_seconds: 1.25,
            velocity: 1.0,
            start_seconds: 0.0,
        };

        engine.trigger(&trigger).unwrap();
        engine.trigger(&trigger).unwrap();
        assert_eq!(engine.triggered(), 2);

        engine.release_all().unwrap();
        assert_eq!(engine.triggered(), 0);
    }
}
