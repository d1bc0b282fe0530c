//! Timeline events
//!
//! Events sit on the timeline at a beat and span `width` beats. While the
//! clock passes over them they go through start, playing and end steps;
//! the engine applies each kind's effect.

use serde::{Deserialize, Serialize};

use super::color::Color;

fn default_beats_per_bounce() -> f32 {
    1.0
}

/// Stable handle for an event inside one engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EventId(pub u32);

/// Closed set of registered event kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventKind {
    /// Send a ball down the road
    Deploy {
        #[serde(default = "default_beats_per_bounce")]
        beats_per_bounce: f32,
    },
    /// Marks the end of the level
    End,
    /// Fade the background gradient over the event width
    GradientChange { start: Color, end: Color },
}

impl EventKind {
    /// Kinds whose effect must be replayed when playback starts past them
    pub fn always_simulated(&self) -> bool {
        matches!(self, EventKind::GradientChange { .. })
    }
}

/// Lifecycle of an event during one playthrough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventState {
    #[default]
    Pending,
    Active,
    Finished,
}

/// What an event went through during one step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EventStep {
    pub started: bool,
    /// Progress through the event while it is playing
    pub progress: Option<f32>,
    pub ended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(skip)]
    pub id: EventId,
    pub beat: f32,
    #[serde(default)]
    pub width: f32,
    /// Editor track row
    #[serde(default)]
    pub track: u32,
    #[serde(flatten)]
    pub kind: EventKind,
    #[serde(skip)]
    pub state: EventState,
}

impl Event {
    pub fn new(beat: f32, width: f32, kind: EventKind) -> Self {
        Self {
            id: EventId::default(),
            beat,
            width: width.max(0.0),
            track: 0,
            kind,
            state: EventState::Pending,
        }
    }

    pub fn deploy(beat: f32, beats_per_bounce: f32) -> Self {
        Self::new(beat, 0.0, EventKind::Deploy { beats_per_bounce })
    }

    pub fn end(beat: f32) -> Self {
        Self::new(beat, 0.0, EventKind::End)
    }

    pub fn end_beat(&self) -> f32 {
        self.beat + self.width
    }

    /// True when the whole event lies before `beat`
    pub fn is_before(&self, beat: f32) -> bool {
        self.end_beat() < beat
    }

    pub fn progress(&self, beat: f32) -> f32 {
        if self.width <= 0.0 {
            return 1.0;
        }
        ((beat - self.beat) / self.width).clamp(0.0, 1.0)
    }

    /// Advance the lifecycle to `beat`
    pub fn step(&mut self, beat: f32) -> EventStep {
        let mut step = EventStep::default();
        if self.state == EventState::Finished || beat < self.beat {
            return step;
        }
        if self.state == EventState::Pending {
            self.state = EventState::Active;
            step.started = true;
        }
        step.progress = Some(self.progress(beat));
        if beat >= self.end_beat() {
            self.state = EventState::Finished;
            step.ended = true;
        }
        step
    }
}
