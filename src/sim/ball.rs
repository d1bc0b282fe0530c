//! Ball trajectory and bounce state machine
//!
//! A ball hops from bouncer to bouncer, one hop every `beats_per_bounce`
//! beats. Hops onto a player bouncer need a timed press; without one the ball
//! falls off the road and is removed after one last falling hop.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::bouncer::{Bouncer, bouncer_clamped, last_index};
use super::input::InputType;
use super::tempo::TempoMap;
use crate::consts::*;
use crate::{bounce_in, bounce_out, lerp};

/// Shortest hop allowed, keeps segment math finite
const MIN_BEATS_PER_BOUNCE: f32 = 0.01;

/// Ball state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallState {
    /// Mid-hop toward `segment.to`
    Traveling,
    /// Sitting on a player bouncer until its input window closes
    AwaitingInput,
    /// Missed; dropping off the road
    FallingOff,
}

/// One hop between two bouncers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BounceSegment {
    pub from: usize,
    /// Destination bouncer, `None` while falling off the road
    pub to: Option<usize>,
    pub start_beat: f32,
    pub end_beat: f32,
    pub arc_height: f32,
}

impl BounceSegment {
    /// Progress through the hop in [0, 1]
    pub fn progress(&self, beat: f32) -> f32 {
        let len = self.end_beat - self.start_beat;
        if len <= 0.0 {
            return 1.0;
        }
        ((beat - self.start_beat) / len).clamp(0.0, 1.0)
    }
}

/// Input window prepared for the next player bouncer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallOff {
    pub bouncer: usize,
    pub input_type: InputType,
    /// Seconds of the perfect bounce
    pub perfect_sec: f32,
    pub satisfied: bool,
}

impl FallOff {
    pub fn accepts(&self, seconds: f32) -> bool {
        (seconds - self.perfect_sec).abs() <= MAX_OFFSET_SEC
    }

    pub fn expired(&self, seconds: f32) -> bool {
        seconds > self.perfect_sec + MAX_OFFSET_SEC
    }
}

/// Things that happened to a ball during an update
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BallEvent {
    /// Landed on and left a bouncer
    Bounced { bouncer: usize },
    /// Robot mode took a player bounce on its own
    AutoHit { input_type: InputType },
    /// Window closed without a press
    FellOff {
        input_type: InputType,
        late_by: f32,
    },
    /// Reached the end of the road
    Finished,
}

/// Per-frame view of the world a ball needs
#[derive(Debug, Clone, Copy)]
pub struct BallContext<'a> {
    pub beat: f32,
    pub seconds: f32,
    pub tempos: &'a TempoMap,
    pub bouncers: &'a [Bouncer],
    /// False in robot mode: player bouncers bounce by themselves
    pub input_required: bool,
    /// Shift applied to presses; windows close on the same shifted time
    pub input_calibration_sec: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ball {
    pub id: u32,
    /// Beat the ball left the first bouncer
    pub sent_out_at: f32,
    pub beats_per_bounce: f32,
    pub bounces: u32,
    pub segment: BounceSegment,
    pub state: BallState,
    pub fall_off: Option<FallOff>,
    pub did_fall_off: bool,
    pub killed: bool,
    pub pos: Vec3,
}

impl Ball {
    pub fn new(id: u32, sent_out_at: f32, beats_per_bounce: f32, ctx: &BallContext) -> Self {
        let beats_per_bounce = if beats_per_bounce.is_finite() {
            beats_per_bounce.max(MIN_BEATS_PER_BOUNCE)
        } else {
            1.0
        };
        let mut ball = Self {
            id,
            sent_out_at,
            beats_per_bounce,
            bounces: 0,
            segment: BounceSegment {
                from: 0,
                to: Some(1),
                start_beat: sent_out_at,
                end_beat: sent_out_at + beats_per_bounce,
                arc_height: 0.0,
            },
            state: BallState::Traveling,
            fall_off: None,
            did_fall_off: false,
            killed: false,
            pos: Vec3::ZERO,
        };
        ball.begin_segment(0, sent_out_at, ctx);
        ball.pos = ball.position_at(ctx.beat, ctx.bouncers);
        ball
    }

    pub fn arc_height(&self) -> f32 {
        ARC_HEIGHT_PER_BEAT * self.beats_per_bounce + ARC_HEIGHT_BASE
    }

    /// Start the hop leaving `from`, preparing the input window when the
    /// destination belongs to the player
    fn begin_segment(&mut self, from: usize, start_beat: f32, ctx: &BallContext) {
        let to = (from + 1).min(last_index(ctx.bouncers));
        let end_beat = start_beat + self.beats_per_bounce;
        self.segment = BounceSegment {
            from,
            to: Some(to),
            start_beat,
            end_beat,
            arc_height: self.arc_height(),
        };
        self.fall_off = bouncer_clamped(ctx.bouncers, to)
            .and_then(|b| b.kind.input_type())
            .map(|input_type| FallOff {
                bouncer: to,
                input_type,
                perfect_sec: ctx.tempos.beats_to_seconds(end_beat),
                satisfied: false,
            });
        self.state = BallState::Traveling;
    }

    /// Drop off the road from the bouncer that was missed
    fn begin_fall(&mut self, from: usize) {
        let start_beat = self.segment.end_beat;
        self.segment = BounceSegment {
            from,
            to: None,
            start_beat,
            end_beat: start_beat + self.beats_per_bounce,
            arc_height: self.arc_height(),
        };
        self.fall_off = None;
        self.state = BallState::FallingOff;
    }

    /// Land on the current destination and continue (or finish)
    fn bounce_at(&mut self, bouncer: usize, ctx: &BallContext, events: &mut Vec<BallEvent>) {
        self.bounces += 1;
        events.push(BallEvent::Bounced { bouncer });
        if bouncer >= last_index(ctx.bouncers) {
            self.killed = true;
            events.push(BallEvent::Finished);
        } else {
            self.begin_segment(bouncer, self.segment.end_beat, ctx);
        }
    }

    /// Advance the state machine to `ctx.beat`, appending what happened
    pub fn update(&mut self, ctx: &BallContext, events: &mut Vec<BallEvent>) {
        while !self.killed {
            match self.state {
                BallState::Traveling => {
                    if ctx.beat < self.segment.end_beat {
                        break;
                    }
                    let Some(to) = self.segment.to else {
                        self.state = BallState::FallingOff;
                        continue;
                    };
                    if let Some(fall_off) = self.fall_off.as_mut().filter(|f| !f.satisfied) {
                        if ctx.input_required {
                            self.state = BallState::AwaitingInput;
                            continue;
                        }
                        fall_off.satisfied = true;
                        events.push(BallEvent::AutoHit {
                            input_type: fall_off.input_type,
                        });
                    }
                    self.bounce_at(to, ctx, events);
                }
                BallState::AwaitingInput => {
                    let Some(fall_off) = self.fall_off else {
                        self.state = BallState::Traveling;
                        continue;
                    };
                    let now = ctx.seconds - ctx.input_calibration_sec;
                    if fall_off.satisfied {
                        self.bounce_at(fall_off.bouncer, ctx, events);
                    } else if fall_off.expired(now) {
                        self.did_fall_off = true;
                        events.push(BallEvent::FellOff {
                            input_type: fall_off.input_type,
                            late_by: now - fall_off.perfect_sec,
                        });
                        self.begin_fall(fall_off.bouncer);
                    } else {
                        break;
                    }
                }
                BallState::FallingOff => {
                    if ctx.beat >= self.segment.end_beat {
                        self.killed = true;
                    }
                    break;
                }
            }
        }
        self.pos = self.position_at(ctx.beat, ctx.bouncers);
    }

    /// Try to take a press; returns the signed accuracy when it lands in
    /// the window of this ball's pending player bounce
    pub fn accept_input(&mut self, input_type: InputType, seconds: f32) -> Option<f32> {
        if self.killed || self.state == BallState::FallingOff {
            return None;
        }
        let fall_off = self.fall_off.as_mut()?;
        if fall_off.satisfied || fall_off.input_type != input_type || !fall_off.accepts(seconds) {
            return None;
        }
        fall_off.satisfied = true;
        Some(seconds - fall_off.perfect_sec)
    }

    /// Input window still waiting for a press
    pub fn pending_input(&self) -> Option<&FallOff> {
        if self.killed || self.state == BallState::FallingOff {
            return None;
        }
        self.fall_off.as_ref().filter(|f| !f.satisfied)
    }

    pub fn kill(&mut self) {
        self.killed = true;
    }

    /// Interpolated position at `beat` within the current hop
    pub fn position_at(&self, beat: f32, bouncers: &[Bouncer]) -> Vec3 {
        let seg = &self.segment;
        let from = bouncer_clamped(bouncers, seg.from)
            .map(|b| b.pos)
            .unwrap_or(Vec3::ZERO);
        if self.state == BallState::AwaitingInput {
            // Resting on the player bouncer
            return seg
                .to
                .and_then(|i| bouncer_clamped(bouncers, i))
                .map(|b| b.pos)
                .unwrap_or(from);
        }
        let dest = match seg.to {
            Some(i) => bouncer_clamped(bouncers, i).map(|b| b.pos).unwrap_or(from),
            None => {
                let ahead = bouncer_clamped(bouncers, seg.from + 1)
                    .map(|b| b.pos)
                    .unwrap_or(from);
                Vec3::new(ahead.x, FALL_OFF_Y, ahead.z)
            }
        };

        let t = seg.progress(beat);
        let peak = from.y + seg.arc_height;
        let y = if t < 0.5 {
            lerp(from.y, peak, bounce_out(t * 2.0))
        } else {
            lerp(peak, dest.y, bounce_in((t - 0.5) * 2.0))
        };
        Vec3::new(lerp(from.x, dest.x, t), y, lerp(from.z, dest.z, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::bouncer::create_bouncers;

    fn ctx<'a>(beat: f32, tempos: &'a TempoMap, bouncers: &'a [Bouncer]) -> BallContext<'a> {
        BallContext {
            beat,
            seconds: tempos.beats_to_seconds(beat),
            tempos,
            bouncers,
            input_required: true,
            input_calibration_sec: 0.0,
        }
    }

    #[test]
    fn test_one_bounce_per_beat() {
        let tempos = TempoMap::constant(120.0);
        let bouncers = create_bouncers();
        let mut events = Vec::new();
        let mut ball = Ball::new(1, 0.0, 1.0, &ctx(0.0, &tempos, &bouncers));
        assert_eq!(ball.segment.from, 0);

        ball.update(&ctx(0.99, &tempos, &bouncers), &mut events);
        assert_eq!(ball.bounces, 0);

        ball.update(&ctx(1.0, &tempos, &bouncers), &mut events);
        assert_eq!(ball.bounces, 1);
        assert_eq!(ball.segment.from, 1);
        assert!((ball.segment.start_beat - 1.0).abs() < 1e-6);

        ball.update(&ctx(2.0, &tempos, &bouncers), &mut events);
        assert_eq!(ball.bounces, 2);
        assert_eq!(ball.segment.from, 2);
        assert_eq!(
            events,
            vec![BallEvent::Bounced { bouncer: 1 }, BallEvent::Bounced { bouncer: 2 }]
        );
    }

    #[test]
    fn test_arc_shape() {
        let tempos = TempoMap::constant(120.0);
        let bouncers = create_bouncers();
        let ball = Ball::new(1, 0.0, 1.0, &ctx(0.0, &tempos, &bouncers));
        assert!((ball.arc_height() - 108.0).abs() < 1e-4);

        let start = ball.position_at(0.0, &bouncers);
        let apex = ball.position_at(0.5, &bouncers);
        let end = ball.position_at(1.0, &bouncers);
        assert!((start - bouncers[0].pos).length() < 1e-3);
        assert!((apex.y - (bouncers[0].pos.y + 108.0)).abs() < 1e-3);
        assert!((end - bouncers[1].pos).length() < 1e-3);
    }

    #[test]
    fn test_window_prepared_one_bounce_ahead() {
        let tempos = TempoMap::constant(120.0);
        let bouncers = create_bouncers();
        let mut events = Vec::new();
        let mut ball = Ball::new(1, 0.0, 1.0, &ctx(0.0, &tempos, &bouncers));
        assert!(ball.pending_input().is_none());

        // Leaves bouncer 11 at beat 11 heading for the D-pad bouncer
        ball.update(&ctx(11.0, &tempos, &bouncers), &mut events);
        let pending = ball.pending_input().copied();
        assert_eq!(pending.map(|f| f.bouncer), Some(DPAD_BOUNCER_INDEX));
        assert_eq!(pending.map(|f| f.input_type), Some(InputType::DPad));
        // Beat 12 at 120 bpm
        assert!((pending.map(|f| f.perfect_sec).unwrap_or(0.0) - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_early_input_then_bounce() {
        let tempos = TempoMap::constant(120.0);
        let bouncers = create_bouncers();
        let mut events = Vec::new();
        let mut ball = Ball::new(1, 0.0, 1.0, &ctx(0.0, &tempos, &bouncers));
        ball.update(&ctx(11.9, &tempos, &bouncers), &mut events);

        // 30 ms early
        assert_eq!(ball.accept_input(InputType::A, 5.97), None);
        let accuracy = ball.accept_input(InputType::DPad, 5.97);
        assert!((accuracy.unwrap_or(1.0) + 0.03).abs() < 1e-4);
        // Second press on the same window is ignored
        assert_eq!(ball.accept_input(InputType::DPad, 5.98), None);

        ball.update(&ctx(12.0, &tempos, &bouncers), &mut events);
        assert_eq!(ball.segment.from, DPAD_BOUNCER_INDEX);
        assert!(!ball.did_fall_off);
    }

    #[test]
    fn test_late_input_while_awaiting() {
        let tempos = TempoMap::constant(120.0);
        let bouncers = create_bouncers();
        let mut events = Vec::new();
        let mut ball = Ball::new(1, 0.0, 1.0, &ctx(0.0, &tempos, &bouncers));
        ball.update(&ctx(12.02, &tempos, &bouncers), &mut events);
        assert_eq!(ball.state, BallState::AwaitingInput);
        assert!((ball.pos - bouncers[DPAD_BOUNCER_INDEX].pos).length() < 1e-3);

        let accuracy = ball.accept_input(InputType::DPad, 6.01);
        assert!(accuracy.is_some());
        ball.update(&ctx(12.04, &tempos, &bouncers), &mut events);
        assert_eq!(ball.state, BallState::Traveling);
        assert_eq!(ball.segment.from, DPAD_BOUNCER_INDEX);
        // Grid is kept: the next hop started on the beat
        assert!((ball.segment.start_beat - 12.0).abs() < 1e-5);
    }

    #[test]
    fn test_falls_off_without_input() {
        let tempos = TempoMap::constant(120.0);
        let bouncers = create_bouncers();
        let mut events = Vec::new();
        let mut ball = Ball::new(1, 0.0, 1.0, &ctx(0.0, &tempos, &bouncers));
        ball.update(&ctx(12.0, &tempos, &bouncers), &mut events);
        assert!(!ball.did_fall_off);

        // 6 s + 5/60 s window closes at beat ~12.1667
        ball.update(&ctx(12.2, &tempos, &bouncers), &mut events);
        assert!(ball.did_fall_off);
        assert_eq!(ball.state, BallState::FallingOff);
        assert!(ball.segment.to.is_none());
        assert!(matches!(
            events.last(),
            Some(BallEvent::FellOff { input_type: InputType::DPad, .. })
        ));

        // Falls toward y = -32 and is removed after the falling hop
        let landing = ball.position_at(13.0, &bouncers);
        assert!((landing.y - FALL_OFF_Y).abs() < 1e-3);
        ball.update(&ctx(13.0, &tempos, &bouncers), &mut events);
        assert!(ball.killed);
    }

    #[test]
    fn test_robot_mode_runs_whole_road() {
        let tempos = TempoMap::constant(120.0);
        let bouncers = create_bouncers();
        let mut events = Vec::new();
        let mut robot = ctx(0.0, &tempos, &bouncers);
        robot.input_required = false;
        let mut ball = Ball::new(1, 0.0, 1.0, &robot);

        robot.beat = 20.0;
        robot.seconds = 10.0;
        ball.update(&robot, &mut events);
        assert!(ball.killed);
        assert!(!ball.did_fall_off);
        assert_eq!(ball.bounces as usize, BOUNCER_COUNT - 1);
        assert_eq!(events.iter().filter(|e| matches!(e, BallEvent::AutoHit { .. })).count(), 2);
        assert_eq!(events.last(), Some(&BallEvent::Finished));
    }
}
