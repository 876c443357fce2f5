//! Landmark identifiers, per-frame landmark maps and the input boundary.
//!
//! Everything coming from the pose collaborator passes through here before it
//! reaches the classifiers. Non-finite coordinates are rejected on insert;
//! missing, low-confidence and off-frame landmarks surface as [`FrameError`]
//! from [`LandmarkFrame::require`].

use crate::geometry::Point2D;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;

/// Detection confidence below which a landmark is treated as unusable.
pub const DEFAULT_MIN_VISIBILITY: f64 = 0.5;

/// Number of landmarks in a MediaPipe pose result.
pub const MEDIAPIPE_POSE_LANDMARKS: usize = 33;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LandmarkId {
    Nose,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
}

impl LandmarkId {
    pub const ALL: [LandmarkId; 13] = [
        LandmarkId::Nose,
        LandmarkId::LeftEar,
        LandmarkId::RightEar,
        LandmarkId::LeftShoulder,
        LandmarkId::RightShoulder,
        LandmarkId::LeftElbow,
        LandmarkId::RightElbow,
        LandmarkId::LeftWrist,
        LandmarkId::RightWrist,
        LandmarkId::LeftHip,
        LandmarkId::RightHip,
        LandmarkId::LeftKnee,
        LandmarkId::RightKnee,
    ];

    /// Position of this landmark in a MediaPipe pose landmark list.
    pub fn mediapipe_index(self) -> usize {
        match self {
            LandmarkId::Nose => 0,
            LandmarkId::LeftEar => 7,
            LandmarkId::RightEar => 8,
            LandmarkId::LeftShoulder => 11,
            LandmarkId::RightShoulder => 12,
            LandmarkId::LeftElbow => 13,
            LandmarkId::RightElbow => 14,
            LandmarkId::LeftWrist => 15,
            LandmarkId::RightWrist => 16,
            LandmarkId::LeftHip => 23,
            LandmarkId::RightHip => 24,
            LandmarkId::LeftKnee => 25,
            LandmarkId::RightKnee => 26,
        }
    }
}

/// Body side used to pick the tracked arm.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    #[default]
    Left,
    Right,
}

impl Side {
    pub fn shoulder(self) -> LandmarkId {
        match self {
            Side::Left => LandmarkId::LeftShoulder,
            Side::Right => LandmarkId::RightShoulder,
        }
    }

    pub fn elbow(self) -> LandmarkId {
        match self {
            Side::Left => LandmarkId::LeftElbow,
            Side::Right => LandmarkId::RightElbow,
        }
    }

    pub fn wrist(self) -> LandmarkId {
        match self {
            Side::Left => LandmarkId::LeftWrist,
            Side::Right => LandmarkId::RightWrist,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("landmark {0} is missing from the frame")]
    Missing(LandmarkId),
    #[error("landmark {id} has low visibility ({visibility:.2})")]
    LowConfidence { id: LandmarkId, visibility: f64 },
    #[error("landmark {id} is outside the frame at ({:.3}, {:.3})", .point.x, .point.y)]
    OffFrame { id: LandmarkId, point: Point2D },
    #[error("landmark {0} has non-finite coordinates")]
    NonFinite(LandmarkId),
    #[error("expected {expected} pose landmarks, got {actual}")]
    WrongLandmarkCount { expected: usize, actual: usize },
}

/// One detected landmark with its optional detection confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    #[serde(flatten)]
    pub point: Point2D,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            point: Point2D::new(x, y),
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = Some(visibility);
        self
    }
}

/// Landmarks detected in a single video frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HashMap<LandmarkId, Landmark>", into = "HashMap<LandmarkId, Landmark>")]
pub struct LandmarkFrame {
    landmarks: HashMap<LandmarkId, Landmark>,
}

impl LandmarkFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a landmark. Non-finite coordinates are refused.
    pub fn insert(&mut self, id: LandmarkId, landmark: Landmark) -> Result<(), FrameError> {
        if !landmark.point.is_finite() {
            return Err(FrameError::NonFinite(id));
        }
        self.landmarks.insert(id, landmark);
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, id: LandmarkId, landmark: Landmark) -> Result<Self, FrameError> {
        self.insert(id, landmark)?;
        Ok(self)
    }

    pub fn get(&self, id: LandmarkId) -> Option<&Landmark> {
        self.landmarks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Look up a landmark the caller depends on and check it is usable.
    pub fn require(&self, id: LandmarkId, min_visibility: f64) -> Result<Point2D, FrameError> {
        let landmark = self.get(id).ok_or(FrameError::Missing(id))?;

        if let Some(visibility) = landmark.visibility {
            if visibility < min_visibility {
                return Err(FrameError::LowConfidence { id, visibility });
            }
        }

        if !landmark.point.is_on_frame() {
            return Err(FrameError::OffFrame {
                id,
                point: landmark.point,
            });
        }

        Ok(landmark.point)
    }

    /// Build a frame from a full MediaPipe pose list of `[x, y, visibility]`.
    /// Landmarks this crate does not use are dropped.
    pub fn from_mediapipe(pose: &[[f64; 3]]) -> Result<Self, FrameError> {
        if pose.len() != MEDIAPIPE_POSE_LANDMARKS {
            return Err(FrameError::WrongLandmarkCount {
                expected: MEDIAPIPE_POSE_LANDMARKS,
                actual: pose.len(),
            });
        }

        let mut frame = Self::new();
        for id in LandmarkId::ALL {
            let [x, y, visibility] = pose[id.mediapipe_index()];
            frame.insert(id, Landmark::new(x, y).with_visibility(visibility))?;
        }
        Ok(frame)
    }
}

impl TryFrom<HashMap<LandmarkId, Landmark>> for LandmarkFrame {
    type Error = FrameError;

    fn try_from(map: HashMap<LandmarkId, Landmark>) -> Result<Self, Self::Error> {
        let mut frame = Self::new();
        for (id, landmark) in map {
            frame.insert(id, landmark)?;
        }
        Ok(frame)
    }
}

impl From<LandmarkFrame> for HashMap<LandmarkId, Landmark> {
    fn from(frame: LandmarkFrame) -> Self {
        frame.landmarks
    }
}

/// A landmark frame stamped with the monotonic time it was captured.
#[derive(Debug, Clone)]
pub struct TimedFrame {
    pub at: Instant,
    pub frame: LandmarkFrame,
}

impl TimedFrame {
    pub fn new(at: Instant, frame: LandmarkFrame) -> Self {
        Self { at, frame }
    }
}
