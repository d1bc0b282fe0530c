//! Tempo map and time signatures
//!
//! Beats are the unit of musical time. The tempo map converts between beats
//! and seconds by walking piecewise-constant tempo segments. Each change
//! caches the seconds at which it begins; every mutation re-derives that
//! cache for all changes, otherwise audio and visuals drift apart.

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_BPM;

/// Two beats closer than this are treated as the same position
const BEAT_EPSILON: f32 = 1e-4;

/// Swing feel applied inside each `division`-long cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Swing {
    /// Fraction of the cell taken by the first half (0.5 = straight)
    pub ratio: f32,
    /// Cell length in beats
    pub division: f32,
}

impl Default for Swing {
    fn default() -> Self {
        Self::STRAIGHT
    }
}

impl Swing {
    pub const STRAIGHT: Swing = Swing {
        ratio: 0.5,
        division: 0.5,
    };
    /// Triplet swing on eighth notes
    pub const SWING_EIGHTHS: Swing = Swing {
        ratio: 2.0 / 3.0,
        division: 0.5,
    };

    pub fn is_straight(&self) -> bool {
        (self.ratio - 0.5).abs() < f32::EPSILON
    }

    fn clamped_ratio(&self) -> f32 {
        self.ratio.clamp(0.01, 0.99)
    }

    /// Map a straight beat position to its swung position
    pub fn linear_to_swing(&self, beat: f32) -> f32 {
        if self.division <= 0.0 || self.is_straight() {
            return beat;
        }
        let r = self.clamped_ratio();
        let cells = beat / self.division;
        let cell = cells.floor();
        let x = cells - cell;
        let y = if x < 0.5 {
            x * 2.0 * r
        } else {
            r + (x - 0.5) * 2.0 * (1.0 - r)
        };
        (cell + y) * self.division
    }

    /// Inverse of [`Swing::linear_to_swing`]
    pub fn swing_to_linear(&self, beat: f32) -> f32 {
        if self.division <= 0.0 || self.is_straight() {
            return beat;
        }
        let r = self.clamped_ratio();
        let cells = beat / self.division;
        let cell = cells.floor();
        let y = cells - cell;
        let x = if y < r {
            y / r * 0.5
        } else {
            0.5 + (y - r) / (1.0 - r) * 0.5
        };
        (cell + x) * self.division
    }
}

/// A tempo change point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub beat: f32,
    pub bpm: f32,
    #[serde(default)]
    pub swing: Swing,
    /// Seconds at `beat`, derived by the owning map
    #[serde(skip)]
    seconds: f32,
}

impl TempoChange {
    pub fn new(beat: f32, bpm: f32) -> Self {
        Self {
            beat,
            bpm,
            swing: Swing::STRAIGHT,
            seconds: 0.0,
        }
    }

    pub fn with_swing(mut self, swing: Swing) -> Self {
        self.swing = swing;
        self
    }

    /// Cached seconds at this change's beat
    pub fn seconds(&self) -> f32 {
        self.seconds
    }

    #[inline]
    fn seconds_per_beat(&self) -> f32 {
        60.0 / self.bpm
    }
}

/// Ordered list of tempo changes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TempoMap {
    changes: Vec<TempoChange>,
}

impl TempoMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constant tempo map
    pub fn constant(bpm: f32) -> Self {
        Self::from_changes([TempoChange::new(0.0, bpm)])
    }

    /// Build from unordered changes; later duplicates of a beat win
    pub fn from_changes(changes: impl IntoIterator<Item = TempoChange>) -> Self {
        let mut map = Self::new();
        for change in changes {
            map.insert_sorted(change);
        }
        map.recompute();
        map
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Insert a change, replacing one at the same beat
    pub fn add(&mut self, change: TempoChange) {
        self.insert_sorted(change);
        self.recompute();
    }

    /// Remove the change at `beat`, if any
    pub fn remove_at(&mut self, beat: f32) -> Option<TempoChange> {
        let idx = self
            .changes
            .iter()
            .position(|c| (c.beat - beat).abs() < BEAT_EPSILON)?;
        let removed = self.changes.remove(idx);
        self.recompute();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    fn insert_sorted(&mut self, change: TempoChange) {
        if let Some(existing) = self
            .changes
            .iter_mut()
            .find(|c| (c.beat - change.beat).abs() < BEAT_EPSILON)
        {
            *existing = change;
            return;
        }
        let idx = self.changes.partition_point(|c| c.beat < change.beat);
        self.changes.insert(idx, change);
    }

    /// Re-derive cached seconds for every change
    fn recompute(&mut self) {
        let mut prev: Option<TempoChange> = None;
        for change in &mut self.changes {
            change.seconds = match prev {
                // Extrapolate the first segment back to beat 0
                None => change.beat * change.seconds_per_beat(),
                Some(p) => p.seconds + (change.beat - p.beat) * p.seconds_per_beat(),
            };
            prev = Some(*change);
        }
    }

    /// The change governing `beat` (the first change for earlier beats)
    fn segment_for_beat(&self, beat: f32) -> Option<&TempoChange> {
        let idx = self.changes.partition_point(|c| c.beat <= beat);
        self.changes.get(idx.saturating_sub(1))
    }

    fn segment_for_seconds(&self, seconds: f32) -> Option<&TempoChange> {
        let idx = self.changes.partition_point(|c| c.seconds <= seconds);
        self.changes.get(idx.saturating_sub(1))
    }

    pub fn beats_to_seconds(&self, beat: f32) -> f32 {
        match self.segment_for_beat(beat) {
            Some(seg) => seg.seconds + (beat - seg.beat) * seg.seconds_per_beat(),
            None => beat * 60.0 / DEFAULT_BPM,
        }
    }

    pub fn seconds_to_beats(&self, seconds: f32) -> f32 {
        match self.segment_for_seconds(seconds) {
            Some(seg) => seg.beat + (seconds - seg.seconds) / seg.seconds_per_beat(),
            None => seconds * DEFAULT_BPM / 60.0,
        }
    }

    /// Tempo in effect at `beat`
    pub fn tempo_at(&self, beat: f32) -> f32 {
        self.segment_for_beat(beat)
            .map(|c| c.bpm)
            .unwrap_or(DEFAULT_BPM)
    }

    /// Swing in effect at `beat`
    pub fn swing_at(&self, beat: f32) -> Swing {
        self.segment_for_beat(beat)
            .map(|c| c.swing)
            .unwrap_or_default()
    }
}

/// Time signature change point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSignature {
    pub beat: f32,
    pub beats_per_measure: u32,
    pub beat_unit: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beat: 0.0,
            beats_per_measure: 4,
            beat_unit: 4,
        }
    }
}

impl TimeSignature {
    /// Length of one counted beat, in quarter-note beats
    pub fn tick_interval(&self) -> f32 {
        4.0 / self.beat_unit.max(1) as f32
    }
}

/// A metronome tick crossed during a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetronomeTick {
    /// True on the first beat of a measure
    pub accent: bool,
}

/// Ordered time signature changes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSignatures {
    entries: Vec<TimeSignature>,
}

impl TimeSignatures {
    pub fn from_entries(entries: impl IntoIterator<Item = TimeSignature>) -> Self {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.beat.total_cmp(&b.beat));
        entries.dedup_by(|b, a| (a.beat - b.beat).abs() < BEAT_EPSILON);
        Self { entries }
    }

    pub fn entries(&self) -> &[TimeSignature] {
        &self.entries
    }

    /// Signature in effect at `beat` (4/4 when none applies)
    pub fn at(&self, beat: f32) -> TimeSignature {
        let idx = self.entries.partition_point(|t| t.beat <= beat);
        match idx {
            0 => TimeSignature::default(),
            i => self.entries[i - 1],
        }
    }

    /// The tick crossed when moving from `prev` to `current`, if any.
    /// Ticks sit on the straight grid and sound at their swung positions.
    pub fn tick_between(&self, prev: f32, current: f32, swing: Swing) -> Option<MetronomeTick> {
        if current <= prev {
            return None;
        }
        let sig = self.at(current);
        let (prev, current) = (swing.swing_to_linear(prev), swing.swing_to_linear(current));
        let interval = sig.tick_interval();
        let prev_count = ((prev - sig.beat) / interval).floor() as i64;
        let current_count = ((current - sig.beat) / interval).floor() as i64;
        if current_count <= prev_count || current_count < 0 {
            return None;
        }
        Some(MetronomeTick {
            accent: current_count % sig.beats_per_measure.max(1) as i64 == 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn test_constant_120_bpm() {
        let map = TempoMap::constant(120.0);
        assert!(approx(map.beats_to_seconds(2.0), 1.0));
        assert!(approx(map.seconds_to_beats(1.0), 2.0));
    }

    #[test]
    fn test_empty_map_falls_back_to_120() {
        let map = TempoMap::new();
        assert!(approx(map.beats_to_seconds(4.0), 2.0));
        assert!(approx(map.seconds_to_beats(3.0), 6.0));
        assert!(approx(map.tempo_at(10.0), 120.0));
    }

    #[test]
    fn test_tempo_change_mid_song() {
        // 4 beats at 120 (2s) then 60 bpm
        let map = TempoMap::from_changes([TempoChange::new(0.0, 120.0), TempoChange::new(4.0, 60.0)]);
        assert!(approx(map.beats_to_seconds(4.0), 2.0));
        assert!(approx(map.beats_to_seconds(6.0), 4.0));
        assert!(approx(map.seconds_to_beats(4.0), 6.0));
        assert!(approx(map.tempo_at(3.9), 120.0));
        assert!(approx(map.tempo_at(4.0), 60.0));
    }

    #[test]
    fn test_extrapolates_before_first_change() {
        let map = TempoMap::from_changes([TempoChange::new(4.0, 60.0)]);
        assert!(approx(map.changes()[0].seconds(), 4.0));
        assert!(approx(map.beats_to_seconds(2.0), 2.0));
        assert!(approx(map.seconds_to_beats(1.0), 1.0));
    }

    #[test]
    fn test_mutation_rederives_cached_seconds() {
        let mut map = TempoMap::from_changes([
            TempoChange::new(0.0, 120.0),
            TempoChange::new(8.0, 240.0),
        ]);
        assert!(approx(map.changes()[1].seconds(), 4.0));

        map.add(TempoChange::new(4.0, 60.0));
        // 4 beats @120 = 2s, 4 beats @60 = 4s
        assert!(approx(map.changes()[2].seconds(), 6.0));

        map.remove_at(4.0);
        assert!(approx(map.changes()[1].seconds(), 4.0));
    }

    #[test]
    fn test_add_same_beat_replaces() {
        let mut map = TempoMap::constant(120.0);
        map.add(TempoChange::new(0.0, 90.0));
        assert_eq!(map.changes().len(), 1);
        assert!(approx(map.tempo_at(0.0), 90.0));
    }

    #[test]
    fn test_swing_round_trip() {
        let swing = Swing::SWING_EIGHTHS;
        // Offbeat eighth lands two thirds through the cell
        assert!(approx(swing.linear_to_swing(0.25), 1.0 / 3.0));
        assert!(approx(swing.linear_to_swing(0.5), 0.5));
        for beat in [0.1, 0.3, 0.45, 1.2, 3.77] {
            assert!(approx(swing.swing_to_linear(swing.linear_to_swing(beat)), beat));
        }
        assert!(approx(Swing::STRAIGHT.linear_to_swing(0.3), 0.3));
    }

    #[test]
    fn test_metronome_ticks() {
        let sigs = TimeSignatures::default();
        let straight = Swing::STRAIGHT;
        assert_eq!(sigs.tick_between(0.9, 1.1, straight), Some(MetronomeTick { accent: false }));
        assert_eq!(sigs.tick_between(3.9, 4.1, straight), Some(MetronomeTick { accent: true }));
        assert_eq!(sigs.tick_between(1.1, 1.5, straight), None);

        let waltz = TimeSignatures::from_entries([TimeSignature {
            beat: 0.0,
            beats_per_measure: 3,
            beat_unit: 8,
        }]);
        // Eighth-note beats every 0.5, measures every 1.5
        assert_eq!(waltz.tick_between(1.4, 1.6, straight), Some(MetronomeTick { accent: true }));
        assert_eq!(waltz.tick_between(0.4, 0.6, straight), Some(MetronomeTick { accent: false }));
    }

    #[test]
    fn test_swung_sixteenth_ticks() {
        let sigs = TimeSignatures::from_entries([TimeSignature {
            beat: 0.0,
            beats_per_measure: 4,
            beat_unit: 16,
        }]);
        // Straight tick at 0.25 sounds at 1/3 when eighths swing
        assert!(sigs.tick_between(0.24, 0.30, Swing::STRAIGHT).is_some());
        assert_eq!(sigs.tick_between(0.24, 0.30, Swing::SWING_EIGHTHS), None);
        assert_eq!(
            sigs.tick_between(0.30, 0.34, Swing::SWING_EIGHTHS),
            Some(MetronomeTick { accent: false })
        );
        // Downbeats do not move
        assert!(sigs.tick_between(0.99, 1.01, Swing::SWING_EIGHTHS).is_some());
    }

    #[test]
    fn test_swing_at_follows_changes() {
        let map = TempoMap::from_changes([
            TempoChange::new(0.0, 120.0),
            TempoChange::new(4.0, 120.0).with_swing(Swing::SWING_EIGHTHS),
        ]);
        assert_eq!(map.swing_at(1.0), Swing::STRAIGHT);
        assert_eq!(map.swing_at(5.0), Swing::SWING_EIGHTHS);
        assert_eq!(TempoMap::new().swing_at(5.0), Swing::STRAIGHT);
    }

    proptest! {
        #[test]
        fn prop_beats_seconds_inverse(
            beat in 0.0f32..500.0,
            bpm_a in 30.0f32..300.0,
            bpm_b in 30.0f32..300.0,
            change_at in 1.0f32..200.0,
        ) {
            let map = TempoMap::from_changes([
                TempoChange::new(0.0, bpm_a),
                TempoChange::new(change_at, bpm_b),
            ]);
            let back = map.seconds_to_beats(map.beats_to_seconds(beat));
            prop_assert!((back - beat).abs() < 1e-2, "{} != {}", back, beat);
        }

        #[test]
        fn prop_seconds_monotonic(a in 0.0f32..200.0, b in 0.0f32..200.0, bpm in 30.0f32..300.0) {
            let map = TempoMap::from_changes([TempoChange::new(0.0, bpm), TempoChange::new(16.0, bpm * 2.0)]);
            if a < b {
                prop_assert!(map.beats_to_seconds(a) <= map.beats_to_seconds(b));
            }
        }
    }
}
