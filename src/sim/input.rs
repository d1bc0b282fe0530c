//! Input grading
//!
//! A press is graded by how far it lands from the perfect bounce time.

use serde::{Deserialize, Serialize};

use crate::consts::{ACE_OFFSET_SEC, BARELY_OFFSET_SEC, GOOD_OFFSET_SEC};

/// Player input channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputType {
    A,
    DPad,
}

/// Graded outcome of one expected input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputScore {
    Ace,
    Good,
    Barely,
    Miss,
}

impl InputScore {
    /// Classify a signed timing offset in seconds
    pub fn classify(accuracy_sec: f32) -> Self {
        let off = accuracy_sec.abs();
        if off <= ACE_OFFSET_SEC {
            InputScore::Ace
        } else if off <= GOOD_OFFSET_SEC {
            InputScore::Good
        } else if off <= BARELY_OFFSET_SEC {
            InputScore::Barely
        } else {
            InputScore::Miss
        }
    }

    /// Contribution to the final score
    pub fn weight(&self) -> f32 {
        match self {
            InputScore::Ace => 1.0,
            InputScore::Good => 0.9,
            InputScore::Barely => 0.7,
            InputScore::Miss => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputResult {
    pub input_type: InputType,
    /// Actual minus perfect time (negative = early)
    pub accuracy_sec: f32,
    pub score: InputScore,
}

impl InputResult {
    pub fn new(input_type: InputType, accuracy_sec: f32) -> Self {
        Self {
            input_type,
            accuracy_sec,
            score: InputScore::classify(accuracy_sec),
        }
    }

    /// A missed input with no press at all
    pub fn missed(input_type: InputType, accuracy_sec: f32) -> Self {
        Self {
            input_type,
            accuracy_sec,
            score: InputScore::Miss,
        }
    }
}

/// Final percentage: weighted hits over expected inputs, never NaN
pub fn compute_score(results: &[InputResult], expected_inputs: usize) -> f32 {
    let sum: f32 = results.iter().map(|r| r.score.weight()).sum();
    let score = 100.0 * sum / expected_inputs.max(1) as f32;
    score.clamp(0.0, 100.0)
}
