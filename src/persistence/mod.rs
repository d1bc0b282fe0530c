//! Level persistence
//!
//! Features:
//! - Versioned `data.json` level format
//! - Validation before an engine is built
//! - Background loading with results applied on the simulation thread

pub mod level;
pub mod queue;

pub use level::{CURRENT_VERSION, LevelData, LoadError, MusicMeta, read_level, replace_engine, write_level};
pub use queue::LoadQueue;
