//! `data.json` level format

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::AudioBackend;
use crate::sim::{
    Color, Engine, Event, Gradient, PlayState, TempoChange, TempoMap, TimeSignature,
    TimeSignatures,
};

/// Newest format this build reads and writes
pub const CURRENT_VERSION: u32 = 1;

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_track_count() -> u32 {
    4
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed level data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("level version {found} is newer than this build supports")]
    UnsupportedVersion { found: u32 },
    #[error("invalid tempo {bpm} BPM at beat {beat}")]
    InvalidTempo { beat: f32, bpm: f32 },
    #[error("loader thread exited without a result")]
    Disconnected,
}

/// Music file that plays under the level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicMeta {
    pub filename: String,
    pub extension: String,
}

/// Serialized level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelData {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub playback_start: f32,
    #[serde(default)]
    pub music_start_sec: f32,
    #[serde(default = "default_track_count")]
    pub track_count: u32,
    pub gradient_start: Color,
    pub gradient_end: Color,
    #[serde(default)]
    pub tempos: Vec<TempoChange>,
    #[serde(default)]
    pub time_signatures: Vec<TimeSignature>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicMeta>,
}

impl Default for LevelData {
    fn default() -> Self {
        let gradient = Gradient::default();
        Self {
            version: CURRENT_VERSION,
            playback_start: 0.0,
            music_start_sec: 0.0,
            track_count: default_track_count(),
            gradient_start: gradient.start,
            gradient_end: gradient.end,
            tempos: Vec::new(),
            time_signatures: Vec::new(),
            events: Vec::new(),
            music: None,
        }
    }
}

impl LevelData {
    /// Parse and validate level JSON
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let level: LevelData = serde_json::from_str(json)?;
        level.validate()?;
        Ok(level)
    }

    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.version > CURRENT_VERSION {
            return Err(LoadError::UnsupportedVersion {
                found: self.version,
            });
        }
        if let Some(bad) = self
            .tempos
            .iter()
            .find(|t| !(t.bpm.is_finite() && t.bpm > 0.0) || !t.beat.is_finite())
        {
            return Err(LoadError::InvalidTempo {
                beat: bad.beat,
                bpm: bad.bpm,
            });
        }
        Ok(())
    }

    /// Snapshot an engine's level content
    pub fn capture(engine: &Engine, music: Option<MusicMeta>) -> Self {
        let gradient = engine.default_gradient();
        Self {
            version: CURRENT_VERSION,
            playback_start: engine.playback_start,
            music_start_sec: engine.music_start_sec,
            track_count: engine.track_count,
            gradient_start: gradient.start,
            gradient_end: gradient.end,
            tempos: engine.tempos().changes().to_vec(),
            time_signatures: engine.clock().time_signatures().entries().to_vec(),
            events: engine.events().to_vec(),
            music,
        }
    }

    /// Build a fresh, stopped engine holding this level
    pub fn build_engine(&self, audio: Box<dyn AudioBackend>) -> Result<Engine, LoadError> {
        self.validate()?;

        let mut engine = Engine::new(audio);
        engine.playback_start = self.playback_start;
        engine.music_start_sec = self.music_start_sec;
        engine.track_count = self.track_count;
        engine.set_default_gradient(Gradient::new(self.gradient_start, self.gradient_end));
        engine.set_tempos(TempoMap::from_changes(self.tempos.iter().copied()));
        engine.set_time_signatures(TimeSignatures::from_entries(
            self.time_signatures.iter().copied(),
        ));
        engine.add_all_events(self.events.iter().cloned());

        log::info!(
            "Built level: {} events, {} tempo changes, duration {}",
            engine.events().len(),
            engine.tempos().changes().len(),
            engine.duration()
        );
        Ok(engine)
    }
}

pub fn read_level(path: &Path) -> Result<LevelData, LoadError> {
    let json = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    LevelData::from_json(&json)
}

pub fn write_level(path: &Path, level: &LevelData) -> Result<(), LoadError> {
    fs::write(path, level.to_json()?).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Level written to {}", path.display());
    Ok(())
}

/// Swap `engine` for one built from `level`; on failure the old engine is untouched
pub fn replace_engine(
    engine: &mut Engine,
    level: &LevelData,
    audio: Box<dyn AudioBackend>,
) -> Result<(), LoadError> {
    let fresh = match level.build_engine(audio) {
        Ok(fresh) => fresh,
        Err(e) => {
            log::warn!("Level load failed, keeping current level: {}", e);
            return Err(e);
        }
    };
    engine.set_play_state(PlayState::Stopped);
    *engine = fresh;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudio;
    use crate::sim::EventKind;

    const LEVEL_JSON: &str = r##"{
        "version": 1,
        "playbackStart": 2.0,
        "musicStartSec": 0.25,
        "trackCount": 3,
        "gradientStart": "102030ff",
        "gradientEnd": "#ffffff",
        "tempos": [{"beat": 0.0, "bpm": 120.0}, {"beat": 8.0, "bpm": 60.0}],
        "timeSignatures": [{"beat": 0.0, "beatsPerMeasure": 3, "beatUnit": 4}],
        "events": [
            {"type": "deploy", "beat": 4.0, "beatsPerBounce": 0.5},
            {"type": "gradientChange", "beat": 1.0, "width": 2.0,
             "start": "000000ff", "end": "ff0000ff"},
            {"type": "end", "beat": 32.0}
        ],
        "music": {"filename": "song", "extension": "ogg"}
    }"##;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_parse_level() {
        let level = LevelData::from_json(LEVEL_JSON).unwrap();
        assert_eq!(level.track_count, 3);
        assert_eq!(level.gradient_end, Color::WHITE);
        assert_eq!(level.events.len(), 3);
        assert_eq!(
            level.events[0].kind,
            EventKind::Deploy {
                beats_per_bounce: 0.5
            }
        );
        assert_eq!(level.music.as_ref().map(|m| m.extension.as_str()), Some("ogg"));
    }

    #[test]
    fn test_build_engine() {
        let level = LevelData::from_json(LEVEL_JSON).unwrap();
        let engine = level.build_engine(Box::new(NullAudio)).unwrap();

        assert_eq!(engine.play_state(), PlayState::Stopped);
        assert_eq!(engine.playback_start, 2.0);
        assert_eq!(engine.duration(), 32.0);
        // Events come back sorted by beat
        assert_eq!(engine.events()[0].beat, 1.0);
        // 8 beats at 120 BPM then 60 BPM
        assert!(approx(engine.tempos().beats_to_seconds(10.0), 6.0));
        assert_eq!(engine.clock().time_signatures().at(5.0).beats_per_measure, 3);
    }

    #[test]
    fn test_minimal_level_uses_defaults() {
        let level =
            LevelData::from_json(r#"{"gradientStart":"000000","gradientEnd":"808080"}"#).unwrap();
        assert_eq!(level.version, CURRENT_VERSION);
        let engine = level.build_engine(Box::new(NullAudio)).unwrap();
        assert!(engine.duration().is_infinite());
        assert!(approx(engine.tempos().beats_to_seconds(2.0), 1.0));
    }

    #[test]
    fn test_rejects_newer_version() {
        let json = r#"{"version":2,"gradientStart":"000000","gradientEnd":"000000"}"#;
        assert!(matches!(
            LevelData::from_json(json),
            Err(LoadError::UnsupportedVersion { found: 2 })
        ));
    }

    #[test]
    fn test_rejects_bad_tempo() {
        let json = r#"{"gradientStart":"000000","gradientEnd":"000000",
            "tempos":[{"beat":0.0,"bpm":0.0}]}"#;
        assert!(matches!(
            LevelData::from_json(json),
            Err(LoadError::InvalidTempo { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_colour() {
        let json = r#"{"gradientStart":"nope","gradientEnd":"000000"}"#;
        assert!(matches!(LevelData::from_json(json), Err(LoadError::Json(_))));
    }

    #[test]
    fn test_capture_and_reload() {
        let level = LevelData::from_json(LEVEL_JSON).unwrap();
        let engine = level.build_engine(Box::new(NullAudio)).unwrap();
        let captured = LevelData::capture(&engine, level.music.clone());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        write_level(&path, &captured).unwrap();
        let reloaded = read_level(&path).unwrap();

        assert_eq!(reloaded.tempos.len(), 2);
        assert_eq!(reloaded.events.len(), 3);
        assert_eq!(reloaded.gradient_start, level.gradient_start);
        assert_eq!(reloaded.music, level.music);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_level(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_failed_replace_keeps_engine() {
        let mut engine = LevelData::from_json(LEVEL_JSON)
            .unwrap()
            .build_engine(Box::new(NullAudio))
            .unwrap();
        let bad = LevelData {
            version: 9,
            ..Default::default()
        };
        assert!(replace_engine(&mut engine, &bad, Box::new(NullAudio)).is_err());
        assert_eq!(engine.events().len(), 3);

        replace_engine(&mut engine, &LevelData::default(), Box::new(NullAudio)).unwrap();
        assert!(engine.events().is_empty());
    }
}
