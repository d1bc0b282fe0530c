//! Bouncer road layout
//!
//! Bouncers sit at fixed positions along a semicircular road. The ball hops
//! from one to the next; two of them belong to the player.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::input::InputType;
use crate::consts::*;
use crate::{lerp, sine_in, sine_out};

/// Closed set of bouncer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BouncerKind {
    Normal,
    /// Player bouncer bound to the A button
    A,
    /// Player bouncer bound to the D-pad
    DPad,
}

impl BouncerKind {
    /// Input that bounces this bouncer, if it belongs to the player
    pub fn input_type(&self) -> Option<InputType> {
        match self {
            BouncerKind::Normal => None,
            BouncerKind::A => Some(InputType::A),
            BouncerKind::DPad => Some(InputType::DPad),
        }
    }

    pub fn is_player(&self) -> bool {
        self.input_type().is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bouncer {
    pub index: usize,
    pub kind: BouncerKind,
    pub pos: Vec3,
    /// Cosmetic squash amount (1 on bounce, decays to 0)
    pub bounce_amount: f32,
}

impl Bouncer {
    pub fn new(index: usize, kind: BouncerKind, pos: Vec3) -> Self {
        Self {
            index,
            kind,
            pos,
            bounce_amount: 0.0,
        }
    }

    pub fn bounce(&mut self) {
        self.bounce_amount = 1.0;
    }

    /// Decay the bounce animation
    pub fn update(&mut self, dt: f32) {
        if self.bounce_amount > 0.0 {
            self.bounce_amount = (self.bounce_amount - dt * BOUNCE_DECAY_RATE).max(0.0);
        }
    }
}

/// Position of bouncer `index` out of `count` along the road arc
pub fn road_position(index: usize, count: usize) -> Vec3 {
    let t = if count > 1 {
        index as f32 / (count - 1) as f32
    } else {
        0.0
    };
    let y = lerp(ROAD_START_Y, ROAD_END_Y, sine_in(t));
    let x = if t < 0.5 {
        lerp(ROAD_LEFT_X, ROAD_CENTER_X, sine_out(t * 2.0))
    } else {
        lerp(ROAD_CENTER_X, ROAD_RIGHT_X, sine_in((t - 0.5) * 2.0))
    };
    Vec3::new(x, y, t)
}

/// Build the full road of bouncers
pub fn create_bouncers() -> Vec<Bouncer> {
    (0..BOUNCER_COUNT)
        .map(|i| {
            let kind = match i {
                DPAD_BOUNCER_INDEX => BouncerKind::DPad,
                A_BOUNCER_INDEX => BouncerKind::A,
                _ => BouncerKind::Normal,
            };
            Bouncer::new(i, kind, road_position(i, BOUNCER_COUNT))
        })
        .collect()
}

/// Look up a bouncer, clamping the index into range
pub fn bouncer_clamped(bouncers: &[Bouncer], index: usize) -> Option<&Bouncer> {
    bouncers.get(index.min(bouncers.len().saturating_sub(1)))
}

/// Index of the bouncer that ends the road
pub fn last_index(bouncers: &[Bouncer]) -> usize {
    bouncers.len().saturating_sub(1)
}
