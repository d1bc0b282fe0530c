//! Background level loading
//!
//! Reading and parsing happen on a worker thread. The engine itself is built
//! on the simulation thread when the caller polls the result.

use std::path::PathBuf;
use std::sync::mpsc;

use super::level::{LevelData, LoadError, read_level};

#[derive(Debug, Default)]
pub struct LoadQueue {
    rx: Option<mpsc::Receiver<Result<LevelData, LoadError>>>,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start loading `path`; replaces any load still in flight
    pub fn request(&mut self, path: PathBuf) {
        let (tx, rx) = mpsc::channel();
        self.rx = Some(rx);
        log::info!("Loading level {}", path.display());
        std::thread::spawn(move || {
            // Receiver may have been replaced by a newer request
            let _ = tx.send(read_level(&path));
        });
    }

    pub fn is_loading(&self) -> bool {
        self.rx.is_some()
    }

    /// Finished load, if one is ready
    pub fn poll(&mut self) -> Option<Result<LevelData, LoadError>> {
        let rx = self.rx.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(mpsc::TryRecvError::Empty) => return None,
            Err(mpsc::TryRecvError::Disconnected) => Err(LoadError::Disconnected),
        };
        self.rx = None;
        match &result {
            Ok(level) => log::info!("Level loaded ({} events)", level.events.len()),
            Err(e) => log::warn!("Level load failed: {}", e),
        }
        Some(result)
    }
}
