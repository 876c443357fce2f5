use crate::geometry::{angle_between, mean_angle, Point2D};
use crate::landmarks::{FrameError, LandmarkFrame, LandmarkId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Back angle (shoulder-hip-knee) that must be exceeded for good posture.
pub const BACK_THRESHOLD: f64 = 165.0;

/// Neck angle (hip-shoulder-ear) that must be exceeded for good posture.
pub const NECK_THRESHOLD: f64 = 160.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum PostureLabel {
    #[strum(serialize = "Good Posture")]
    Good,
    #[strum(serialize = "Bad Posture")]
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureThresholds {
    pub back: f64,
    pub neck: f64,
}

impl Default for PostureThresholds {
    fn default() -> Self {
        Self {
            back: BACK_THRESHOLD,
            neck: NECK_THRESHOLD,
        }
    }
}

impl PostureThresholds {
    pub fn label(&self, back_angle: f64, neck_angle: f64) -> PostureLabel {
        if back_angle > self.back && neck_angle > self.neck {
            PostureLabel::Good
        } else {
            PostureLabel::Bad
        }
    }

    pub fn classify(&self, landmarks: &PostureLandmarks) -> PostureResult {
        let back_angle = mean_angle(
            angle_between(landmarks.left_shoulder, landmarks.left_hip, landmarks.left_knee),
            angle_between(landmarks.right_shoulder, landmarks.right_hip, landmarks.right_knee),
        );
        let neck_angle = mean_angle(
            angle_between(landmarks.left_hip, landmarks.left_shoulder, landmarks.left_ear),
            angle_between(landmarks.right_hip, landmarks.right_shoulder, landmarks.right_ear),
        );

        PostureResult {
            back_angle,
            neck_angle,
            label: self.label(back_angle, neck_angle),
        }
    }
}

/// The eight points the posture check needs, already validated by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureLandmarks {
    pub left_shoulder: Point2D,
    pub left_hip: Point2D,
    pub left_knee: Point2D,
    pub left_ear: Point2D,
    pub right_shoulder: Point2D,
    pub right_hip: Point2D,
    pub right_knee: Point2D,
    pub right_ear: Point2D,
}

impl PostureLandmarks {
    pub fn from_frame(frame: &LandmarkFrame, min_visibility: f64) -> Result<Self, FrameError> {
        let get = |id| frame.require(id, min_visibility);
        Ok(Self {
            left_shoulder: get(LandmarkId::LeftShoulder)?,
            left_hip: get(LandmarkId::LeftHip)?,
            left_knee: get(LandmarkId::LeftKnee)?,
            left_ear: get(LandmarkId::LeftEar)?,
            right_shoulder: get(LandmarkId::RightShoulder)?,
            right_hip: get(LandmarkId::RightHip)?,
            right_knee: get(LandmarkId::RightKnee)?,
            right_ear: get(LandmarkId::RightEar)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostureResult {
    pub back_angle: f64,
    pub neck_angle: f64,
    pub label: PostureLabel,
}

impl fmt::Display for PostureResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Angles are shown truncated, like the on-frame overlay
        write!(
            f,
            "{} | Back Angle: {} | Neck Angle: {}",
            self.label,
            self.back_angle.trunc() as i64,
            self.neck_angle.trunc() as i64
        )
    }
}

/// Classify posture with the default thresholds. Pure, no confidence checks.
pub fn classify(landmarks: &PostureLandmarks) -> PostureResult {
    PostureThresholds::default().classify(landmarks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, DEFAULT_MIN_VISIBILITY};
    use assert_matches::assert_matches;

    fn p(x: f64, y: f64) -> Point2D {
        Point2D::new(x, y)
    }

    /// Standing straight, side view: ear, shoulder, hip, knee on one vertical.
    fn upright() -> PostureLandmarks {
        PostureLandmarks {
            left_ear: p(0.45, 0.1),
            left_shoulder: p(0.45, 0.25),
            left_hip: p(0.45, 0.55),
            left_knee: p(0.45, 0.8),
            right_ear: p(0.55, 0.1),
            right_shoulder: p(0.55, 0.25),
            right_hip: p(0.55, 0.55),
            right_knee: p(0.55, 0.8),
        }
    }

    #[test]
    fn test_upright_is_good() {
        let result = classify(&upright());
        assert!((result.back_angle - 180.0).abs() < 1e-9);
        assert!((result.neck_angle - 180.0).abs() < 1e-9);
        assert_eq!(result.label, PostureLabel::Good);
    }

    #[test]
    fn test_forward_head_is_bad() {
        let mut landmarks = upright();
        landmarks.left_ear = p(0.6, 0.15);
        landmarks.right_ear = p(0.7, 0.15);
        let result = classify(&landmarks);
        assert!(result.back_angle > BACK_THRESHOLD);
        assert!(result.neck_angle < NECK_THRESHOLD);
        assert_eq!(result.label, PostureLabel::Bad);
    }

    #[test]
    fn test_slouched_back_is_bad() {
        let mut landmarks = upright();
        landmarks.left_shoulder = p(0.6, 0.3);
        landmarks.right_shoulder = p(0.7, 0.3);
        landmarks.left_ear = p(0.65, 0.15);
        landmarks.right_ear = p(0.75, 0.15);
        let result = classify(&landmarks);
        assert!(result.back_angle < BACK_THRESHOLD);
        assert_eq!(result.label, PostureLabel::Bad);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let thresholds = PostureThresholds::default();
        assert_eq!(thresholds.label(165.01, 160.01), PostureLabel::Good);
        assert_eq!(thresholds.label(165.0, 160.0), PostureLabel::Bad);
        assert_eq!(thresholds.label(165.01, 160.0), PostureLabel::Bad);
        assert_eq!(thresholds.label(165.0, 160.01), PostureLabel::Bad);
    }

    #[test]
    fn test_sides_are_averaged() {
        let mut landmarks = upright();
        // Left knee bent forward to a 90 degree back angle, right side straight
        landmarks.left_knee = p(0.7, 0.55);
        let result = classify(&landmarks);
        assert!((result.back_angle - 135.0).abs() < 1e-9);
        assert_eq!(result.label, PostureLabel::Bad);
    }

    #[test]
    fn test_from_frame_requires_all_points() {
        let frame = LandmarkFrame::new()
            .with(LandmarkId::LeftShoulder, Landmark::new(0.45, 0.25))
            .unwrap();
        assert_matches!(
            PostureLandmarks::from_frame(&frame, DEFAULT_MIN_VISIBILITY),
            Err(FrameError::Missing(LandmarkId::LeftHip))
        );
    }

    #[test]
    fn test_from_frame_with_complete_frame() {
        let u = upright();
        let frame = [
            (LandmarkId::LeftEar, u.left_ear),
            (LandmarkId::LeftShoulder, u.left_shoulder),
            (LandmarkId::LeftHip, u.left_hip),
            (LandmarkId::LeftKnee, u.left_knee),
            (LandmarkId::RightEar, u.right_ear),
            (LandmarkId::RightShoulder, u.right_shoulder),
            (LandmarkId::RightHip, u.right_hip),
            (LandmarkId::RightKnee, u.right_knee),
        ]
        .into_iter()
        .try_fold(LandmarkFrame::new(), |frame, (id, point)| {
            frame.with(id, Landmark::new(point.x, point.y).with_visibility(0.9))
        })
        .unwrap();

        let landmarks = PostureLandmarks::from_frame(&frame, DEFAULT_MIN_VISIBILITY).unwrap();
        assert_eq!(landmarks, u);
    }

    #[test]
    fn test_result_display() {
        let result = PostureResult {
            back_angle: 170.9,
            neck_angle: 150.2,
            label: PostureLabel::Bad,
        };
        assert_eq!(
            result.to_string(),
            "Bad Posture | Back Angle: 170 | Neck Angle: 150"
        );
    }
}
