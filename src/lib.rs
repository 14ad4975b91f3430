mod culler;
mod engine;
mod error;
mod extractor;
mod midi_importer;
mod model;
mod player;
mod session;
mod sheet;
mod tempo;
mod timeline;
mod util;

#[cfg(test)]
mod fixtures;

pub use culler::*;
pub use engine::*;
pub use error::{ConveyorError, Result};
pub use extractor::*;
pub use midi_importer::*;
pub use model::config::*;
pub use model::song::*;
pub use player::*;
pub use session::*;
pub use sheet::*;
pub use tempo::*;
pub use timeline::*;
pub use util::*;
