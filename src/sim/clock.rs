//! Beat clock
//!
//! Accumulates elapsed seconds while playing and derives the current beat
//! from them through the tempo map. Seconds and beat only ever change
//! together, through [`Clock::set_seconds`].

use serde::{Deserialize, Serialize};

use super::tempo::{TempoMap, TimeSignatures};

/// Playback state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Default)]
pub struct Clock {
    tempos: TempoMap,
    time_signatures: TimeSignatures,
    seconds: f32,
    beat: f32,
    play_state: PlayState,
}

impl Clock {
    pub fn new(tempos: TempoMap) -> Self {
        let mut clock = Self {
            tempos,
            ..Default::default()
        };
        clock.set_seconds(0.0);
        clock
    }

    /// Advance by a frame delta (only while playing)
    pub fn update(&mut self, delta: f32) {
        if self.play_state != PlayState::Playing {
            return;
        }
        self.set_seconds(self.seconds + delta);
    }

    /// Single setter for elapsed time; the beat is always re-derived
    pub fn set_seconds(&mut self, seconds: f32) {
        self.seconds = seconds;
        self.beat = self.tempos.seconds_to_beats(seconds);
    }

    /// Seek to a beat position
    pub fn seek_to_beat(&mut self, beat: f32) {
        self.set_seconds(self.tempos.beats_to_seconds(beat));
    }

    pub fn seconds(&self) -> f32 {
        self.seconds
    }

    pub fn beat(&self) -> f32 {
        self.beat
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub(crate) fn set_play_state(&mut self, state: PlayState) {
        self.play_state = state;
    }

    pub fn tempos(&self) -> &TempoMap {
        &self.tempos
    }

    /// Mutate the tempo map; the beat is re-derived afterwards
    pub fn edit_tempos<R>(&mut self, edit: impl FnOnce(&mut TempoMap) -> R) -> R {
        let result = edit(&mut self.tempos);
        self.set_seconds(self.seconds);
        result
    }

    pub fn time_signatures(&self) -> &TimeSignatures {
        &self.time_signatures
    }

    pub fn set_time_signatures(&mut self, signatures: TimeSignatures) {
        self.time_signatures = signatures;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::tempo::TempoChange;

    #[test]
    fn test_update_only_while_playing() {
        let mut clock = Clock::new(TempoMap::constant(120.0));
        clock.update(1.0);
        assert_eq!(clock.seconds(), 0.0);

        clock.set_play_state(PlayState::Playing);
        clock.update(1.0);
        assert!((clock.beat() - 2.0).abs() < 1e-4);

        clock.set_play_state(PlayState::Paused);
        clock.update(1.0);
        assert!((clock.seconds() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_tempo_edit_rederives_beat() {
        let mut clock = Clock::new(TempoMap::constant(120.0));
        clock.set_seconds(2.0);
        assert!((clock.beat() - 4.0).abs() < 1e-4);

        clock.edit_tempos(|t| t.add(TempoChange::new(0.0, 60.0)));
        assert!((clock.beat() - 2.0).abs() < 1e-4);
        assert!((clock.seconds() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_seek_to_beat() {
        let mut clock = Clock::new(TempoMap::constant(90.0));
        clock.seek_to_beat(3.0);
        assert!((clock.seconds() - 2.0).abs() < 1e-4);
        assert!((clock.beat() - 3.0).abs() < 1e-4);
    }
}
