use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConveyorError {
    /// Header or track chunk structure is broken. Loading aborts.
    #[error("malformed MIDI: {0}")]
    MalformedMidi(String),

    #[error("unknown duration token '{0}'")]
    UnknownDurationToken(String),

    #[error("unknown note name '{0}'")]
    UnknownNoteName(String),

    #[error("malformed time position '{0}', expected bars:beats:sixteenths")]
    MalformedTimePosition(String),

    #[error("tempo must be a positive number of beats per minute, got {0}")]
    InvalidTempo(f64),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConveyorError>;
