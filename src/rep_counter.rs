use serde::{Deserialize, Serialize};

/// Angle above which the limb counts as fully extended.
pub const EXTEND_THRESHOLD: f64 = 160.0;

/// Angle below which an extended limb counts as fully contracted.
pub const CONTRACT_THRESHOLD: f64 = 30.0;

/// Phase of the current repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum Stage {
    #[default]
    #[strum(serialize = "")]
    None,
    #[strum(serialize = "down")]
    Extended,
    #[strum(serialize = "up")]
    Contracted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepThresholds {
    pub extend: f64,
    pub contract: f64,
}

impl Default for RepThresholds {
    fn default() -> Self {
        Self {
            extend: EXTEND_THRESHOLD,
            contract: CONTRACT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepCounterState {
    pub stage: Stage,
    pub rep_count: u64,
}

/// Emitted once per completed repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepCompleted {
    pub count: u64,
}

/// Hysteretic repetition counter driven by one joint angle per frame.
///
/// A rep is counted when the angle drops below the contract threshold after
/// having been above the extend threshold. Angles between the two thresholds
/// never change the state.
#[derive(Debug, Clone, Default)]
pub struct RepCounter {
    thresholds: RepThresholds,
    state: RepCounterState,
}

impl RepCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: RepThresholds) -> Self {
        Self {
            thresholds,
            state: RepCounterState::default(),
        }
    }

    pub fn update(&mut self, angle: f64) -> Option<RepCompleted> {
        if angle > self.thresholds.extend {
            self.state.stage = Stage::Extended;
            None
        } else if angle < self.thresholds.contract && self.state.stage == Stage::Extended {
            self.state.stage = Stage::Contracted;
            self.state.rep_count += 1;
            Some(RepCompleted {
                count: self.state.rep_count,
            })
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.state = RepCounterState::default();
    }

    pub fn state(&self) -> RepCounterState {
        self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn rep_count(&self) -> u64 {
        self.state.rep_count
    }
}
