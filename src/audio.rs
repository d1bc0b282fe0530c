//! Audio seam
//!
//! The engine only talks to sound through [`AudioBackend`]. Playback itself
//! (decoding, mixing, output devices) lives with whoever embeds the engine.

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundEffect {
    /// Ball lands on a normal bouncer
    Bounce,
    /// Ball lands on a player bouncer
    PlayerBounce,
    /// Player pressed a button (bouncer squash, with or without a ball)
    InputPress,
    /// Ball dropped off the road
    FallOff,
    /// Metronome beat
    MetronomeTick,
    /// Metronome downbeat
    MetronomeAccent,
}

/// Output side the engine drives
///
/// Music positions are in seconds from the start of the track. A backend
/// with no music loaded reports `has_music() == false`, and the engine then
/// runs on the frame clock alone.
pub trait AudioBackend {
    /// Advance playback by a frame delta
    fn update(&mut self, _delta: f32) {}

    fn play_sound(&mut self, effect: SoundEffect);
    fn pause_sounds(&mut self);
    fn resume_sounds(&mut self);
    fn stop_sounds(&mut self);

    fn has_music(&self) -> bool;
    /// Start music from a track position
    fn play_music(&mut self, from_sec: f32);
    fn pause_music(&mut self);
    fn resume_music(&mut self);
    fn is_music_playing(&self) -> bool;
    /// Position the track actually reached, if music is loaded
    fn music_position(&self) -> Option<f32>;

    /// Set volumes (each 0.0 - 1.0)
    fn set_volumes(&mut self, _master: f32, _sfx: f32, _music: f32) {}
}

/// Backend that plays nothing and has no music
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudio;

impl AudioBackend for NullAudio {
    fn play_sound(&mut self, _effect: SoundEffect) {}
    fn pause_sounds(&mut self) {}
    fn resume_sounds(&mut self) {}
    fn stop_sounds(&mut self) {}

    fn has_music(&self) -> bool {
        false
    }
    fn play_music(&mut self, _from_sec: f32) {}
    fn pause_music(&mut self) {}
    fn resume_music(&mut self) {}
    fn is_music_playing(&self) -> bool {
        false
    }
    fn music_position(&self) -> Option<f32> {
        None
    }
}

/// Silent stand-in for a music track of known length
///
/// Advances its position with the frame delta, and loops when `looping` is
/// set. Used for headless runs where the level carries music metadata but no
/// decoder is available.
#[derive(Debug, Clone, Default)]
pub struct SilentTrack {
    length_sec: f32,
    looping: bool,
    position: f32,
    playing: bool,
}

impl SilentTrack {
    pub fn new(length_sec: f32, looping: bool) -> Self {
        Self {
            length_sec: length_sec.max(0.0),
            looping,
            ..Default::default()
        }
    }
}

impl AudioBackend for SilentTrack {
    fn update(&mut self, delta: f32) {
        if !self.playing {
            return;
        }
        self.position += delta;
        if self.position >= self.length_sec {
            if self.looping && self.length_sec > 0.0 {
                self.position %= self.length_sec;
            } else {
                self.position = self.length_sec;
                self.playing = false;
            }
        }
    }

    fn play_sound(&mut self, _effect: SoundEffect) {}
    fn pause_sounds(&mut self) {}
    fn resume_sounds(&mut self) {}
    fn stop_sounds(&mut self) {}

    fn has_music(&self) -> bool {
        true
    }

    fn play_music(&mut self, from_sec: f32) {
        self.position = from_sec.clamp(0.0, self.length_sec);
        self.playing = self.position < self.length_sec;
    }

    fn pause_music(&mut self) {
        self.playing = false;
    }

    fn resume_music(&mut self) {
        self.playing = self.position < self.length_sec;
    }

    fn is_music_playing(&self) -> bool {
        self.playing
    }

    fn music_position(&self) -> Option<f32> {
        Some(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_track_advances_and_ends() {
        let mut track = SilentTrack::new(2.0, false);
        track.update(1.0);
        assert_eq!(track.music_position(), Some(0.0));

        track.play_music(0.5);
        track.update(1.0);
        assert_eq!(track.music_position(), Some(1.5));
        track.update(1.0);
        assert_eq!(track.music_position(), Some(2.0));
        assert!(!track.is_music_playing());
    }

    #[test]
    fn test_silent_track_loops() {
        let mut track = SilentTrack::new(2.0, true);
        track.play_music(1.5);
        track.update(1.0);
        assert!(track.is_music_playing());
        assert!((track.music_position().unwrap_or(0.0) - 0.5).abs() < 1e-5);
    }
}
