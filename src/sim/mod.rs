//! Simulation module
//!
//! All gameplay logic lives here. This module must stay deterministic:
//! - Time only advances through `Engine::update` deltas or the music position
//! - Seeded RNG only (auto player)
//! - Stable iteration order (events by beat, balls by spawn order)
//! - No rendering or platform dependencies

pub mod autoplay;
pub mod ball;
pub mod bouncer;
pub mod clock;
pub mod color;
pub mod engine;
pub mod event;
pub mod input;
pub mod tempo;

pub use autoplay::AutoPlayer;
pub use ball::{Ball, BallEvent, BallState, BounceSegment, FallOff};
pub use bouncer::{Bouncer, BouncerKind, create_bouncers};
pub use clock::{Clock, PlayState};
pub use color::{Color, Gradient};
pub use engine::{Engine, EngineListener, ListenerId};
pub use event::{Event, EventId, EventKind, EventState};
pub use input::{InputResult, InputScore, InputType, compute_score};
pub use tempo::{MetronomeTick, Swing, TempoChange, TempoMap, TimeSignature, TimeSignatures};
