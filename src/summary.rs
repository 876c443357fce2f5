use crate::util::{mean, std_dev};
use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Exercise {
    BicepCurl,
    Posture,
}

impl Exercise {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bicep_curl" => Some(Exercise::BicepCurl),
            "posture" => Some(Exercise::Posture),
            _ => None,
        }
    }
}

/// End-of-session numbers, ready to print or store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub exercise: Exercise,
    pub started_at: DateTime<Local>,
    pub duration_secs: f64,
    pub frames: u64,
    pub skipped_frames: u64,
    pub reps: u64,
    pub warnings: u64,
    pub good_posture_frames: u64,
    pub rep_interval_mean_secs: Option<f64>,
    pub rep_interval_std_dev_secs: Option<f64>,
}

impl SessionSummary {
    pub fn new(exercise: Exercise, started_at: DateTime<Local>) -> Self {
        Self {
            exercise,
            started_at,
            duration_secs: 0.0,
            frames: 0,
            skipped_frames: 0,
            reps: 0,
            warnings: 0,
            good_posture_frames: 0,
            rep_interval_mean_secs: None,
            rep_interval_std_dev_secs: None,
        }
    }

    /// Fill the rep tempo fields from the instants each rep completed at.
    pub fn with_rep_times(mut self, rep_times: &[Instant]) -> Self {
        let intervals = rep_intervals_secs(rep_times);
        self.rep_interval_mean_secs = mean(&intervals);
        self.rep_interval_std_dev_secs = std_dev(&intervals);
        self
    }

    /// Share of classified frames labelled good, if any were classified.
    pub fn good_posture_ratio(&self) -> Option<f64> {
        let classified = self.frames.saturating_sub(self.skipped_frames);
        if classified == 0 {
            None
        } else {
            Some(self.good_posture_frames as f64 / classified as f64)
        }
    }
}

pub fn rep_intervals_secs(rep_times: &[Instant]) -> Vec<f64> {
    rep_times
        .iter()
        .tuple_windows()
        .map(|(a, b)| b.saturating_duration_since(*a).as_secs_f64())
        .collect()
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} session started {} ({:.1}s)",
            self.exercise,
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.duration_secs
        )?;
        writeln!(
            f,
            "frames: {} ({} skipped)",
            self.frames, self.skipped_frames
        )?;
        match self.exercise {
            Exercise::BicepCurl => {
                write!(f, "reps: {}  warnings: {}", self.reps, self.warnings)?;
                if let (Some(m), Some(sd)) =
                    (self.rep_interval_mean_secs, self.rep_interval_std_dev_secs)
                {
                    write!(f, "  tempo: {:.2}s ± {:.2}s", m, sd)?;
                }
            }
            Exercise::Posture => match self.good_posture_ratio() {
                Some(ratio) => write!(f, "good posture: {:.0}%", ratio * 100.0)?,
                None => write!(f, "good posture: n/a")?,
            },
        }
        Ok(())
    }
}
