//! Simulation engine
//!
//! Owns the clock, the bouncer road, live balls, the event timeline and the
//! input results of the current playthrough. Play-state transitions are
//! the only place entities and audio are reset.

use log::{debug, info};

use super::ball::{Ball, BallContext, BallEvent};
use super::bouncer::{Bouncer, create_bouncers};
use super::clock::{Clock, PlayState};
use super::color::Gradient;
use super::event::{Event, EventId, EventKind, EventState};
use super::input::{self, InputResult, InputType};
use super::tempo::{TempoMap, TimeSignatures};
use crate::audio::{AudioBackend, SoundEffect};
use crate::render::RenderState;
use crate::settings::Settings;

/// Music position moving back by more than this counts as a loop wrap
const MUSIC_WRAP_EPSILON: f32 = 1e-3;

/// Callbacks from the engine to UI or other observers
pub trait EngineListener {
    fn on_play_state_changed(&mut self, _old: PlayState, _new: PlayState) {}
    fn on_input_result(&mut self, _result: &InputResult) {}
    fn on_ball_fell_off(&mut self, _ball_id: u32) {}
}

/// Subscription handle returned by [`Engine::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

/// Music playback bookkeeping
#[derive(Debug, Clone, Copy, Default)]
struct MusicSync {
    started: bool,
    wrapped: bool,
    last_position: Option<f32>,
}

pub struct Engine {
    clock: Clock,
    bouncers: Vec<Bouncer>,
    balls: Vec<Ball>,
    events: Vec<Event>,
    input_results: Vec<InputResult>,
    /// Beat playback starts from when leaving STOPPED
    pub playback_start: f32,
    /// Timeline seconds at which the music track starts
    pub music_start_sec: f32,
    /// Editor track rows (kept for round trips)
    pub track_count: u32,
    default_gradient: Gradient,
    gradient: Gradient,
    /// Gradient in effect when each active gradient event began
    gradient_origins: Vec<(EventId, Gradient)>,
    duration: f32,
    last_point: f32,
    expected_inputs: usize,
    robot_mode: bool,
    metronome: bool,
    input_calibration_sec: f32,
    music: MusicSync,
    /// Paused in the middle of a playthrough (not straight from Stopped)
    resumable: bool,
    audio: Box<dyn AudioBackend>,
    listeners: Vec<(ListenerId, Box<dyn EngineListener>)>,
    next_listener_id: u32,
    next_ball_id: u32,
    next_event_id: u32,
}

impl Engine {
    pub fn new(audio: Box<dyn AudioBackend>) -> Self {
        let mut engine = Self {
            clock: Clock::new(TempoMap::new()),
            bouncers: create_bouncers(),
            balls: Vec::new(),
            events: Vec::new(),
            input_results: Vec::new(),
            playback_start: 0.0,
            music_start_sec: 0.0,
            track_count: 4,
            default_gradient: Gradient::default(),
            gradient: Gradient::default(),
            gradient_origins: Vec::new(),
            duration: f32::INFINITY,
            last_point: 0.0,
            expected_inputs: 0,
            robot_mode: false,
            metronome: false,
            input_calibration_sec: 0.0,
            music: MusicSync::default(),
            resumable: false,
            audio,
            listeners: Vec::new(),
            next_listener_id: 1,
            next_ball_id: 1,
            next_event_id: 1,
        };
        engine.recompute_cached_data();
        engine
    }

    pub fn play_state(&self) -> PlayState {
        self.clock.play_state()
    }

    pub fn beat(&self) -> f32 {
        self.clock.beat()
    }

    pub fn seconds(&self) -> f32 {
        self.clock.seconds()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn tempos(&self) -> &TempoMap {
        self.clock.tempos()
    }

    pub fn bouncers(&self) -> &[Bouncer] {
        &self.bouncers
    }

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    /// Bouncers plus live balls
    pub fn entity_count(&self) -> usize {
        self.bouncers.len() + self.balls.len()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn input_results(&self) -> &[InputResult] {
        &self.input_results
    }

    pub fn expected_input_count(&self) -> usize {
        self.expected_inputs
    }

    /// Beat at which playback stops on its own (infinite without an End event)
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Furthest end beat of any event
    pub fn last_point(&self) -> f32 {
        self.last_point
    }

    pub fn gradient(&self) -> Gradient {
        self.gradient
    }

    pub fn default_gradient(&self) -> Gradient {
        self.default_gradient
    }

    pub fn robot_mode(&self) -> bool {
        self.robot_mode
    }

    pub fn audio(&self) -> &dyn AudioBackend {
        self.audio.as_ref()
    }

    pub fn set_tempos(&mut self, tempos: TempoMap) {
        self.clock.edit_tempos(|t| *t = tempos);
        self.recompute_cached_data();
    }

    /// Mutate the tempo map; clock and cached data are refreshed afterwards
    pub fn edit_tempos<R>(&mut self, edit: impl FnOnce(&mut TempoMap) -> R) -> R {
        let result = self.clock.edit_tempos(edit);
        self.recompute_cached_data();
        result
    }

    pub fn set_time_signatures(&mut self, signatures: TimeSignatures) {
        self.clock.set_time_signatures(signatures);
    }

    pub fn set_default_gradient(&mut self, gradient: Gradient) {
        self.default_gradient = gradient;
        if self.play_state() == PlayState::Stopped {
            self.gradient = gradient;
        }
    }

    /// Player bouncers bounce by themselves when set
    pub fn set_robot_mode(&mut self, robot: bool) {
        self.robot_mode = robot;
    }

    pub fn set_metronome(&mut self, enabled: bool) {
        self.metronome = enabled;
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.robot_mode = settings.robot_mode;
        self.metronome = settings.metronome;
        self.input_calibration_sec = settings.input_calibration_sec;
        self.audio.set_volumes(
            settings.master_volume,
            settings.sfx_volume,
            settings.music_volume,
        );
    }

    pub fn subscribe(&mut self, listener: Box<dyn EngineListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> Option<Box<dyn EngineListener>> {
        let idx = self.listeners.iter().position(|(l, _)| *l == id)?;
        Some(self.listeners.remove(idx).1)
    }

    /// Insert an event in beat order and return its handle
    pub fn add_event(&mut self, event: Event) -> EventId {
        let id = self.insert_event(event);
        self.recompute_cached_data();
        id
    }

    pub fn add_all_events(&mut self, events: impl IntoIterator<Item = Event>) -> Vec<EventId> {
        let ids = events.into_iter().map(|e| self.insert_event(e)).collect();
        self.recompute_cached_data();
        ids
    }

    pub fn remove_event(&mut self, id: EventId) -> Option<Event> {
        let idx = self.events.iter().position(|e| e.id == id)?;
        let removed = self.events.remove(idx);
        self.recompute_cached_data();
        Some(removed)
    }

    pub fn remove_all_events(&mut self, ids: &[EventId]) -> Vec<Event> {
        let mut removed = Vec::new();
        self.events.retain(|e| {
            if ids.contains(&e.id) {
                removed.push(e.clone());
                false
            } else {
                true
            }
        });
        self.recompute_cached_data();
        removed
    }

    fn insert_event(&mut self, mut event: Event) -> EventId {
        let id = EventId(self.next_event_id);
        self.next_event_id += 1;
        event.id = id;
        event.state = EventState::Pending;
        let idx = self.events.partition_point(|e| e.beat <= event.beat);
        self.events.insert(idx, event);
        id
    }

    /// Recalculate duration, bounds and expected input count after edits
    pub fn recompute_cached_data(&mut self) {
        self.duration = self
            .events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::End))
            .map(|e| e.beat)
            .fold(f32::INFINITY, f32::min);
        self.last_point = self
            .events
            .iter()
            .map(Event::end_beat)
            .fold(0.0, f32::max);
        self.expected_inputs = self.count_expected_inputs(self.playback_start);
    }

    /// Player bounces the deploys at or after `from_beat` will ask for
    fn count_expected_inputs(&self, from_beat: f32) -> usize {
        let player_indices: Vec<usize> = self
            .bouncers
            .iter()
            .filter(|b| b.kind.is_player())
            .map(|b| b.index)
            .collect();
        self.events
            .iter()
            .filter(|e| !e.is_before(from_beat))
            .filter_map(|e| match e.kind {
                EventKind::Deploy { beats_per_bounce } => Some((e.beat, beats_per_bounce)),
                _ => None,
            })
            .map(|(beat, bpb)| {
                let bpb = bpb.max(0.01);
                player_indices
                    .iter()
                    .filter(|&&i| beat + i as f32 * bpb < self.duration)
                    .count()
            })
            .sum()
    }

    pub fn set_play_state(&mut self, new: PlayState) {
        let old = self.play_state();
        if old == new {
            return;
        }
        self.clock.set_play_state(new);

        match new {
            PlayState::Stopped => {
                self.audio.stop_sounds();
                self.audio.pause_music();
                self.music = MusicSync::default();
                self.resumable = false;
                self.balls.clear();
                self.gradient_origins.clear();
                self.bouncers = create_bouncers();
            }
            PlayState::Paused => {
                self.resumable = old == PlayState::Playing;
                self.audio.pause_sounds();
                self.audio.pause_music();
            }
            PlayState::Playing if old == PlayState::Stopped || !self.resumable => {
                self.input_results.clear();
                self.clock.seek_to_beat(self.playback_start);
                self.gradient = self.default_gradient;
                self.pre_resolve_events();
                self.expected_inputs = self.count_expected_inputs(self.playback_start);
                self.music = MusicSync::default();
                self.start_music_if_due();
            }
            PlayState::Playing => {
                self.audio.resume_sounds();
                if self.music.started {
                    self.audio.resume_music();
                }
            }
        }

        info!(
            "Play state {:?} -> {:?} at beat {:.3}",
            old,
            new,
            self.clock.beat()
        );
        for (_, listener) in &mut self.listeners {
            listener.on_play_state_changed(old, new);
        }
    }

    /// Settle every event before the seek point
    fn pre_resolve_events(&mut self) {
        let seek = self.clock.beat();
        for i in 0..self.events.len() {
            self.events[i].state = EventState::Pending;
            if !self.events[i].is_before(seek) {
                continue;
            }
            if self.events[i].kind.always_simulated() {
                let end = self.events[i].end_beat();
                self.step_event(i, end);
            }
            self.events[i].state = EventState::Finished;
        }
    }

    fn start_music_if_due(&mut self) {
        if self.music.started || !self.audio.has_music() {
            return;
        }
        let seconds = self.clock.seconds();
        if seconds >= self.music_start_sec {
            self.audio.play_music(seconds - self.music_start_sec);
            self.music.started = true;
            self.music.last_position = None;
            debug!("Music started at {:.3}s", seconds);
        }
    }

    pub fn update(&mut self, delta: f32) {
        if self.play_state() != PlayState::Playing {
            return;
        }

        self.audio.update(delta);
        let prev_beat = self.clock.beat();
        self.sync_clock(delta);

        let beat = self.clock.beat();
        for i in 0..self.events.len() {
            if self.events[i].beat > beat {
                break;
            }
            self.step_event(i, beat);
        }

        self.update_entities(delta);

        if self.metronome {
            let swing = self.clock.tempos().swing_at(beat);
            let signatures = self.clock.time_signatures();
            if let Some(tick) = signatures.tick_between(prev_beat, beat, swing) {
                self.audio.play_sound(if tick.accent {
                    SoundEffect::MetronomeAccent
                } else {
                    SoundEffect::MetronomeTick
                });
            }
        }

        if beat >= self.duration {
            self.set_play_state(PlayState::Stopped);
        }
    }

    /// Advance the clock, following the music when it is playing
    fn sync_clock(&mut self, delta: f32) {
        if self.music.started && !self.music.wrapped && self.audio.is_music_playing() {
            if let Some(position) = self.audio.music_position() {
                let wrapped = self
                    .music
                    .last_position
                    .is_some_and(|last| position + MUSIC_WRAP_EPSILON < last);
                self.music.last_position = Some(position);
                if wrapped {
                    debug!("Music wrapped around, following the frame clock");
                    self.music.wrapped = true;
                    self.clock.update(delta);
                } else {
                    self.clock.set_seconds(self.music_start_sec + position);
                }
                return;
            }
        }
        self.clock.update(delta);
        self.start_music_if_due();
    }

    fn step_event(&mut self, idx: usize, beat: f32) {
        let step = self.events[idx].step(beat);
        if step.started {
            self.on_event_start(idx);
        }
        if let Some(progress) = step.progress {
            self.on_event_playing(idx, progress);
        }
        if step.ended {
            self.on_event_end(idx);
        }
    }

    fn on_event_start(&mut self, idx: usize) {
        let (id, beat, kind) = {
            let event = &self.events[idx];
            (event.id, event.beat, event.kind.clone())
        };
        match kind {
            EventKind::Deploy { beats_per_bounce } => {
                self.spawn_ball(beat, beats_per_bounce);
            }
            EventKind::GradientChange { .. } => {
                self.gradient_origins.push((id, self.gradient));
            }
            EventKind::End => {}
        }
    }

    fn on_event_playing(&mut self, idx: usize, progress: f32) {
        let id = self.events[idx].id;
        if let EventKind::GradientChange { start, end } = self.events[idx].kind {
            let origin = self
                .gradient_origins
                .iter()
                .find(|(origin_id, _)| *origin_id == id)
                .map(|(_, g)| *g);
            if let Some(origin) = origin {
                self.gradient = Gradient::lerp(origin, Gradient::new(start, end), progress);
            }
        }
    }

    fn on_event_end(&mut self, idx: usize) {
        let id = self.events[idx].id;
        if let EventKind::GradientChange { start, end } = self.events[idx].kind {
            self.gradient = Gradient::new(start, end);
            self.gradient_origins.retain(|(origin_id, _)| *origin_id != id);
        }
    }

    fn spawn_ball(&mut self, sent_out_at: f32, beats_per_bounce: f32) -> u32 {
        let id = self.next_ball_id;
        self.next_ball_id += 1;
        let ctx = BallContext {
            beat: self.clock.beat(),
            seconds: self.clock.seconds(),
            tempos: self.clock.tempos(),
            bouncers: &self.bouncers,
            input_required: !self.robot_mode,
            input_calibration_sec: self.input_calibration_sec,
        };
        let ball = Ball::new(id, sent_out_at, beats_per_bounce, &ctx);
        self.balls.push(ball);
        id
    }

    /// Remove a live ball right away
    pub fn kill_ball(&mut self, id: u32) -> bool {
        let before = self.balls.len();
        self.balls.retain(|b| b.id != id);
        self.balls.len() != before
    }

    fn update_entities(&mut self, delta: f32) {
        for bouncer in &mut self.bouncers {
            bouncer.update(delta);
        }

        let ctx = BallContext {
            beat: self.clock.beat(),
            seconds: self.clock.seconds(),
            tempos: self.clock.tempos(),
            bouncers: &self.bouncers,
            input_required: !self.robot_mode,
            input_calibration_sec: self.input_calibration_sec,
        };
        let mut outcomes: Vec<(u32, BallEvent)> = Vec::new();
        let mut scratch = Vec::new();
        for ball in &mut self.balls {
            ball.update(&ctx, &mut scratch);
            outcomes.extend(scratch.drain(..).map(|e| (ball.id, e)));
        }

        for (ball_id, outcome) in outcomes {
            match outcome {
                BallEvent::Bounced { bouncer } => {
                    let effect = match self.bouncers.get_mut(bouncer) {
                        Some(b) => {
                            b.bounce();
                            if b.kind.is_player() {
                                SoundEffect::PlayerBounce
                            } else {
                                SoundEffect::Bounce
                            }
                        }
                        None => SoundEffect::Bounce,
                    };
                    self.audio.play_sound(effect);
                }
                BallEvent::AutoHit { input_type } => {
                    self.record_result(InputResult::new(input_type, 0.0));
                }
                BallEvent::FellOff {
                    input_type,
                    late_by,
                } => {
                    debug!("Ball {} fell off at {:?} bouncer", ball_id, input_type);
                    self.audio.play_sound(SoundEffect::FallOff);
                    self.record_result(InputResult::missed(input_type, late_by));
                    for (_, listener) in &mut self.listeners {
                        listener.on_ball_fell_off(ball_id);
                    }
                }
                BallEvent::Finished => {}
            }
        }

        self.balls.retain(|b| !b.killed);
    }

    /// Handle a button press; grades it against the closest waiting ball
    pub fn fire_input(&mut self, input_type: InputType) -> Option<InputResult> {
        if self.play_state() != PlayState::Playing {
            return None;
        }
        for bouncer in &mut self.bouncers {
            if bouncer.kind.input_type() == Some(input_type) {
                bouncer.bounce();
            }
        }
        self.audio.play_sound(SoundEffect::InputPress);

        let now = self.clock.seconds() - self.input_calibration_sec;
        let target = self
            .balls
            .iter()
            .enumerate()
            .filter_map(|(i, b)| {
                b.pending_input()
                    .filter(|f| f.input_type == input_type && f.accepts(now))
                    .map(|f| (i, f.perfect_sec))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)?;

        let accuracy = self.balls[target].accept_input(input_type, now)?;
        let result = InputResult::new(input_type, accuracy);
        self.record_result(result);
        Some(result)
    }

    fn record_result(&mut self, result: InputResult) {
        self.input_results.push(result);
        for (_, listener) in &mut self.listeners {
            listener.on_input_result(&result);
        }
    }

    /// Percentage score of the current playthrough
    pub fn compute_score(&self) -> f32 {
        input::compute_score(&self.input_results, self.expected_inputs)
    }

    pub fn render_state(&self) -> RenderState {
        RenderState::capture(self)
    }
}
