use crate::session::{Frame, SoundTrigger};

mod headless;

pub use headless::LogEngine;

pub type DefaultEngine = LogEngine;

/// Produces sound for notes the playback clock has reached.
pub trait SoundEngine: Send + Sync {
    fn trigger(&self, trigger: &SoundTrigger) -> anyhow::Result<()>;

    /// Silence everything still sounding. Called on stop.
    fn release_all(&self) -> anyhow::Result<()>;
}

/// Draws one conveyor frame.
pub trait FrameRenderer: Send + Sync {
    fn render(&self, frame: &Frame);
}
