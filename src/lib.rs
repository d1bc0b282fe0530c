//! Bouncy Road - beat-mapped rhythm minigame core
//!
//! Core modules:
//! - `sim`: Simulation (tempo map, clock, bouncers, balls, engine)
//! - `audio`: Sound effect ids and the audio backend seam
//! - `render`: Per-frame render snapshot (gradient, instance data)
//! - `persistence`: Level data (`data.json`) load/save
//! - `settings`: Player preferences
//! - `highscores`: Local leaderboard

pub mod audio;
pub mod highscores;
pub mod persistence;
pub mod render;
pub mod settings;
pub mod sim;

pub use highscores::HighScores;
pub use settings::Settings;

/// Game configuration constants
pub mod consts {
    /// Frame rate the timing windows are expressed in
    pub const FRAME_RATE: f32 = 60.0;

    /// Half-width of the input window around a perfect bounce (5 frames)
    pub const MAX_OFFSET_SEC: f32 = 5.0 / FRAME_RATE;
    /// Accuracy thresholds (absolute seconds)
    pub const ACE_OFFSET_SEC: f32 = 1.0 / FRAME_RATE;
    pub const GOOD_OFFSET_SEC: f32 = 3.0 / FRAME_RATE;
    pub const BARELY_OFFSET_SEC: f32 = 4.0 / FRAME_RATE;

    /// Tempo used when no tempo change exists
    pub const DEFAULT_BPM: f32 = 120.0;

    /// Road layout
    pub const BOUNCER_COUNT: usize = 15;
    pub const DPAD_BOUNCER_INDEX: usize = 12;
    pub const A_BOUNCER_INDEX: usize = 13;
    pub const ROAD_LEFT_X: f32 = 128.0;
    pub const ROAD_CENTER_X: f32 = 640.0;
    pub const ROAD_RIGHT_X: f32 = 1152.0;
    pub const ROAD_START_Y: f32 = 640.0;
    pub const ROAD_END_Y: f32 = 150.0;

    /// Bounce animation decay (amount per second)
    pub const BOUNCE_DECAY_RATE: f32 = 5.0;

    /// Ball arc: height = ARC_HEIGHT_PER_BEAT * beats_per_bounce + ARC_HEIGHT_BASE
    pub const ARC_HEIGHT_PER_BEAT: f32 = 100.0;
    pub const ARC_HEIGHT_BASE: f32 = 8.0;
    /// Height a falling ball drops to before removal
    pub const FALL_OFF_Y: f32 = -32.0;
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Sine ease-in: slow start, fast finish
#[inline]
pub fn sine_in(t: f32) -> f32 {
    1.0 - (t * std::f32::consts::FRAC_PI_2).cos()
}

/// Sine ease-out: fast start, slow finish
#[inline]
pub fn sine_out(t: f32) -> f32 {
    (t * std::f32::consts::FRAC_PI_2).sin()
}

/// Quadratic ease-out, the rising half of a bounce arc
#[inline]
pub fn bounce_out(t: f32) -> f32 {
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Quadratic ease-in, the falling half of a bounce arc
#[inline]
pub fn bounce_in(t: f32) -> f32 {
    t * t
}
