//! Render snapshot
//!
//! Everything a renderer needs for one frame, captured from the engine.
//! Instance data is plain-old-data so it can be uploaded as-is.

use bytemuck::{Pod, Zeroable};

use crate::sim::{BallState, Color, Engine, Gradient};

/// One bouncer, ready for an instance buffer
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct BouncerInstance {
    pub position: [f32; 3],
    /// Squash amount of the bounce animation
    pub bounce: f32,
    pub color: [f32; 4],
}

/// One ball, ready for an instance buffer
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct BallInstance {
    pub position: [f32; 3],
    /// 1.0 while the ball is dropping off the road
    pub falling: f32,
}

/// Colors for road elements
pub mod colors {
    use crate::sim::Color;

    pub const BOUNCER: Color = Color::rgba(0.85, 0.85, 0.85, 1.0);
    pub const BOUNCER_A: Color = Color::rgba(0.9, 0.2, 0.2, 1.0);
    pub const BOUNCER_DPAD: Color = Color::rgba(0.2, 0.4, 0.9, 1.0);
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub gradient: Gradient,
    pub bouncers: Vec<BouncerInstance>,
    pub balls: Vec<BallInstance>,
    pub beat: f32,
}

impl RenderState {
    pub fn capture(engine: &Engine) -> Self {
        use crate::sim::BouncerKind;

        let bouncers = engine
            .bouncers()
            .iter()
            .map(|b| {
                let color: Color = match b.kind {
                    BouncerKind::Normal => colors::BOUNCER,
                    BouncerKind::A => colors::BOUNCER_A,
                    BouncerKind::DPad => colors::BOUNCER_DPAD,
                };
                BouncerInstance {
                    position: b.pos.to_array(),
                    bounce: b.bounce_amount,
                    color: color.to_array(),
                }
            })
            .collect();

        let balls = engine
            .balls()
            .iter()
            .map(|b| BallInstance {
                position: b.pos.to_array(),
                falling: if b.state == BallState::FallingOff { 1.0 } else { 0.0 },
            })
            .collect();

        Self {
            gradient: engine.gradient(),
            bouncers,
            balls,
            beat: engine.beat(),
        }
    }

    /// Bouncer instances as raw bytes
    pub fn bouncer_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.bouncers)
    }

    /// Ball instances as raw bytes
    pub fn ball_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.balls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullAudio;
    use crate::consts::BOUNCER_COUNT;
    use crate::sim::{Event, PlayState, TempoMap};

    #[test]
    fn test_capture() {
        let mut engine = Engine::new(Box::new(NullAudio));
        engine.set_tempos(TempoMap::constant(120.0));
        engine.add_event(Event::deploy(0.0, 1.0));
        engine.set_play_state(PlayState::Playing);
        engine.update(0.1);

        let state = engine.render_state();
        assert_eq!(state.bouncers.len(), BOUNCER_COUNT);
        assert_eq!(state.balls.len(), 1);
        assert_eq!(state.gradient, engine.gradient());
        assert_eq!(
            state.bouncer_bytes().len(),
            BOUNCER_COUNT * std::mem::size_of::<BouncerInstance>()
        );
        assert_eq!(state.ball_bytes().len(), std::mem::size_of::<BallInstance>());
    }
}
