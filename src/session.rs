//! Per-user workout sessions.
//!
//! A session owns every piece of mutable classifier state for one camera
//! feed. Methods take `&mut self`, so a session is driven by exactly one
//! consumer; run several feeds by creating several sessions.

use crate::form_monitor::{BadFormWarning, FormMonitor, FormRules};
use crate::geometry::angle_between;
use crate::landmarks::{FrameError, Side, TimedFrame, DEFAULT_MIN_VISIBILITY};
use crate::posture::{PostureLabel, PostureLandmarks, PostureResult, PostureThresholds};
use crate::rep_counter::{RepCompleted, RepCounter, RepThresholds, Stage};
use crate::summary::{Exercise, SessionSummary};
use chrono::{DateTime, Local};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How long after the first frame the start announcement is made.
pub const START_PROMPT_DELAY: Duration = Duration::from_secs(3);

pub const START_MESSAGE: &str = "Starting bicep curl counter.";

/// Something the renderer or speaker should present to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum CoachEvent {
    Started { message: String },
    Rep(RepCompleted),
    BadForm(BadFormWarning),
    Posture(PostureResult),
}

impl fmt::Display for CoachEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoachEvent::Started { message } => f.write_str(message),
            CoachEvent::Rep(rep) => write!(f, "Bicep Curl rep number {}", rep.count),
            CoachEvent::BadForm(warning) => write!(f, "{warning}"),
            CoachEvent::Posture(result) => write!(f, "{result}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurlSettings {
    pub side: Side,
    pub min_visibility: f64,
    pub thresholds: RepThresholds,
    pub form: FormRules,
    pub start_prompt_delay: Duration,
}

impl Default for CurlSettings {
    fn default() -> Self {
        Self {
            side: Side::Left,
            min_visibility: DEFAULT_MIN_VISIBILITY,
            thresholds: RepThresholds::default(),
            form: FormRules::default(),
            start_prompt_delay: START_PROMPT_DELAY,
        }
    }
}

/// Monotonic and wall-clock start of a session, captured on the first frame.
#[derive(Debug, Clone, Copy)]
struct SessionClock {
    first_frame: Instant,
    last_frame: Instant,
    started_at: DateTime<Local>,
}

impl SessionClock {
    fn observe(clock: &mut Option<SessionClock>, at: Instant) -> SessionClock {
        let clock = clock.get_or_insert_with(|| SessionClock {
            first_frame: at,
            last_frame: at,
            started_at: Local::now(),
        });
        if at > clock.last_frame {
            clock.last_frame = at;
        }
        *clock
    }

    fn duration_secs(clock: Option<SessionClock>) -> f64 {
        clock.map_or(0.0, |c| {
            c.last_frame
                .saturating_duration_since(c.first_frame)
                .as_secs_f64()
        })
    }
}

/// Bicep curl coaching for one arm: rep counting plus bad-form advisories.
#[derive(Debug, Clone)]
pub struct CurlSession {
    settings: CurlSettings,
    counter: RepCounter,
    monitor: FormMonitor,
    clock: Option<SessionClock>,
    announced: bool,
    last_angle: Option<f64>,
    frames: u64,
    skipped_frames: u64,
    warnings: u64,
    rep_times: Vec<Instant>,
}

impl Default for CurlSession {
    fn default() -> Self {
        Self::new(CurlSettings::default())
    }
}

impl CurlSession {
    pub fn new(settings: CurlSettings) -> Self {
        Self {
            counter: RepCounter::with_thresholds(settings.thresholds),
            monitor: FormMonitor::with_rules(settings.form.clone()),
            settings,
            clock: None,
            announced: false,
            last_angle: None,
            frames: 0,
            skipped_frames: 0,
            warnings: 0,
            rep_times: Vec::new(),
        }
    }

    /// Elbow angle of the tracked arm, if its landmarks are usable.
    pub fn elbow_angle(&self, frame: &TimedFrame) -> Result<f64, FrameError> {
        let side = self.settings.side;
        let min_visibility = self.settings.min_visibility;
        let shoulder = frame.frame.require(side.shoulder(), min_visibility)?;
        let elbow = frame.frame.require(side.elbow(), min_visibility)?;
        let wrist = frame.frame.require(side.wrist(), min_visibility)?;
        Ok(angle_between(shoulder, elbow, wrist))
    }

    pub fn process_frame(&mut self, frame: &TimedFrame) -> Result<Vec<CoachEvent>, FrameError> {
        self.frames += 1;
        let clock = SessionClock::observe(&mut self.clock, frame.at);

        let mut events = Vec::new();
        if !self.announced
            && frame.at.saturating_duration_since(clock.first_frame)
                > self.settings.start_prompt_delay
        {
            self.announced = true;
            events.push(CoachEvent::Started {
                message: START_MESSAGE.to_string(),
            });
        }

        let angle = match self.elbow_angle(frame) {
            Ok(angle) => angle,
            Err(e) => {
                self.skipped_frames += 1;
                debug!(error = %e, "skipping frame");
                return if events.is_empty() { Err(e) } else { Ok(events) };
            }
        };
        self.last_angle = Some(angle);

        if let Some(rep) = self.counter.update(angle) {
            info!(count = rep.count, angle, "rep completed");
            self.rep_times.push(frame.at);
            events.push(CoachEvent::Rep(rep));
        }

        if let Some(warning) = self.monitor.update(angle, frame.at) {
            info!(angle, "bad form detected");
            self.warnings += 1;
            events.push(CoachEvent::BadForm(warning));
        }

        Ok(events)
    }

    pub fn reset(&mut self) {
        self.counter.reset();
        self.monitor.reset();
        self.clock = None;
        self.announced = false;
        self.last_angle = None;
        self.frames = 0;
        self.skipped_frames = 0;
        self.warnings = 0;
        self.rep_times.clear();
    }

    pub fn rep_count(&self) -> u64 {
        self.counter.rep_count()
    }

    pub fn stage(&self) -> Stage {
        self.counter.stage()
    }

    pub fn last_angle(&self) -> Option<f64> {
        self.last_angle
    }

    pub fn summary(&self) -> SessionSummary {
        let started_at = self.clock.map_or_else(Local::now, |c| c.started_at);
        let mut summary =
            SessionSummary::new(Exercise::BicepCurl, started_at).with_rep_times(&self.rep_times);
        summary.duration_secs = SessionClock::duration_secs(self.clock);
        summary.frames = self.frames;
        summary.skipped_frames = self.skipped_frames;
        summary.reps = self.counter.rep_count();
        summary.warnings = self.warnings;
        summary
    }
}

/// Per-frame posture classification over a stream, with running totals.
#[derive(Debug, Clone)]
pub struct PostureSession {
    thresholds: PostureThresholds,
    min_visibility: f64,
    clock: Option<SessionClock>,
    frames: u64,
    skipped_frames: u64,
    good_frames: u64,
}

impl Default for PostureSession {
    fn default() -> Self {
        Self::new(PostureThresholds::default(), DEFAULT_MIN_VISIBILITY)
    }
}

impl PostureSession {
    pub fn new(thresholds: PostureThresholds, min_visibility: f64) -> Self {
        Self {
            thresholds,
            min_visibility,
            clock: None,
            frames: 0,
            skipped_frames: 0,
            good_frames: 0,
        }
    }

    pub fn process_frame(&mut self, frame: &TimedFrame) -> Result<CoachEvent, FrameError> {
        self.frames += 1;
        SessionClock::observe(&mut self.clock, frame.at);

        let landmarks = PostureLandmarks::from_frame(&frame.frame, self.min_visibility)
            .inspect_err(|e| {
                self.skipped_frames += 1;
                debug!(error = %e, "skipping frame");
            })?;

        let result = self.thresholds.classify(&landmarks);
        if result.label == PostureLabel::Good {
            self.good_frames += 1;
        }
        Ok(CoachEvent::Posture(result))
    }

    pub fn reset(&mut self) {
        self.clock = None;
        self.frames = 0;
        self.skipped_frames = 0;
        self.good_frames = 0;
    }

    pub fn summary(&self) -> SessionSummary {
        let started_at = self.clock.map_or_else(Local::now, |c| c.started_at);
        let mut summary = SessionSummary::new(Exercise::Posture, started_at);
        summary.duration_secs = SessionClock::duration_secs(self.clock);
        summary.frames = self.frames;
        summary.skipped_frames = self.skipped_frames;
        summary.good_posture_frames = self.good_frames;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Landmark, LandmarkFrame, LandmarkId};
    use assert_matches::assert_matches;

    /// Left arm frame with the elbow bent to roughly `angle` degrees.
    fn arm_frame(at: Instant, angle: f64) -> TimedFrame {
        let elbow = (0.5, 0.5);
        let shoulder = (0.5, 0.2);
        let radians = angle.to_radians();
        // Upper arm points straight up from the elbow, forearm rotates from it
        let wrist = (
            elbow.0 + 0.3 * radians.sin(),
            elbow.1 - 0.3 * radians.cos(),
        );
        let frame = LandmarkFrame::new()
            .with(LandmarkId::LeftShoulder, Landmark::new(shoulder.0, shoulder.1))
            .and_then(|f| f.with(LandmarkId::LeftElbow, Landmark::new(elbow.0, elbow.1)))
            .and_then(|f| f.with(LandmarkId::LeftWrist, Landmark::new(wrist.0, wrist.1)))
            .unwrap();
        TimedFrame::new(at, frame)
    }

    fn run(session: &mut CurlSession, t0: Instant, angles: &[f64]) -> Vec<CoachEvent> {
        angles
            .iter()
            .enumerate()
            .flat_map(|(i, angle)| {
                let at = t0 + Duration::from_millis(i as u64 * 100);
                session.process_frame(&arm_frame(at, *angle)).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_elbow_angle_from_frame() {
        let session = CurlSession::default();
        let angle = session.elbow_angle(&arm_frame(Instant::now(), 45.0)).unwrap();
        assert!((angle - 45.0).abs() < 1e-6);
    }

    #[test]
    fn test_curl_counts_and_warns() {
        let mut session = CurlSession::default();
        let t0 = Instant::now();
        let events = run(&mut session, t0, &[170.0, 120.0, 20.0, 170.0, 20.0]);

        assert_eq!(
            events,
            vec![
                CoachEvent::BadForm(BadFormWarning {
                    message: crate::form_monitor::DEFAULT_WARNING_MESSAGE.to_string()
                }),
                CoachEvent::Rep(RepCompleted { count: 1 }),
                CoachEvent::Rep(RepCompleted { count: 2 }),
            ]
        );
        assert_eq!(session.rep_count(), 2);
        assert_eq!(session.stage(), Stage::Contracted);
        assert!((session.last_angle().unwrap() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_start_announcement_fires_once_after_delay() {
        let mut session = CurlSession::default();
        let t0 = Instant::now();
        let mut started = 0;
        for i in 0..60u64 {
            let frame = arm_frame(t0 + Duration::from_millis(i * 100), 175.0);
            for event in session.process_frame(&frame).unwrap() {
                if let CoachEvent::Started { .. } = event {
                    started += 1;
                    assert!(i > 30, "announced too early at frame {i}");
                }
            }
        }
        assert_eq!(started, 1);
    }

    #[test]
    fn test_missing_landmark_skips_frame() {
        let mut session = CurlSession::default();
        let t0 = Instant::now();
        run(&mut session, t0, &[170.0]);

        let frame = TimedFrame::new(
            t0 + Duration::from_millis(100),
            LandmarkFrame::new()
                .with(LandmarkId::LeftShoulder, Landmark::new(0.5, 0.2))
                .unwrap(),
        );
        assert_matches!(
            session.process_frame(&frame),
            Err(FrameError::Missing(LandmarkId::LeftElbow))
        );
        assert_eq!(session.stage(), Stage::Extended);
        assert_eq!(session.summary().skipped_frames, 1);
    }

    #[test]
    fn test_right_side_tracks_right_arm() {
        let mut session = CurlSession::new(CurlSettings {
            side: Side::Right,
            ..CurlSettings::default()
        });
        assert_matches!(
            session.process_frame(&arm_frame(Instant::now(), 170.0)),
            Err(FrameError::Missing(LandmarkId::RightShoulder))
        );
    }

    #[test]
    fn test_reset_reproduces_event_trace() {
        let angles = [170.0, 120.0, 25.0, 150.0, 165.0, 10.0];
        let t0 = Instant::now();

        let mut fresh = CurlSession::default();
        let expected = run(&mut fresh, t0, &angles);

        let mut reused = CurlSession::default();
        run(&mut reused, t0, &[175.0, 130.0, 5.0]);
        reused.reset();
        assert_eq!(reused.rep_count(), 0);
        assert_eq!(reused.stage(), Stage::None);
        assert_eq!(run(&mut reused, t0, &angles), expected);
    }

    #[test]
    fn test_curl_summary() {
        let mut session = CurlSession::default();
        let t0 = Instant::now();
        run(&mut session, t0, &[170.0, 20.0, 170.0, 20.0, 170.0, 20.0]);

        let summary = session.summary();
        assert_eq!(summary.exercise, Exercise::BicepCurl);
        assert_eq!(summary.frames, 6);
        assert_eq!(summary.reps, 3);
        assert!((summary.duration_secs - 0.5).abs() < 1e-9);
        assert!((summary.rep_interval_mean_secs.unwrap() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(
            CoachEvent::Rep(RepCompleted { count: 4 }).to_string(),
            "Bicep Curl rep number 4"
        );
        assert_eq!(
            CoachEvent::Started {
                message: START_MESSAGE.to_string()
            }
            .to_string(),
            "Starting bicep curl counter."
        );
    }

    #[test]
    fn test_posture_session_counts_good_frames() {
        let mut session = PostureSession::default();
        let t0 = Instant::now();
        let upright = [
            (LandmarkId::LeftEar, 0.45, 0.1),
            (LandmarkId::LeftShoulder, 0.45, 0.25),
            (LandmarkId::LeftHip, 0.45, 0.55),
            (LandmarkId::LeftKnee, 0.45, 0.8),
            (LandmarkId::RightEar, 0.55, 0.1),
            (LandmarkId::RightShoulder, 0.55, 0.25),
            (LandmarkId::RightHip, 0.55, 0.55),
            (LandmarkId::RightKnee, 0.55, 0.8),
        ]
        .into_iter()
        .try_fold(LandmarkFrame::new(), |f, (id, x, y)| {
            f.with(id, Landmark::new(x, y))
        })
        .unwrap();

        let event = session
            .process_frame(&TimedFrame::new(t0, upright))
            .unwrap();
        assert_matches!(
            event,
            CoachEvent::Posture(PostureResult {
                label: PostureLabel::Good,
                ..
            })
        );
        assert!(session
            .process_frame(&TimedFrame::new(
                t0 + Duration::from_secs(1),
                LandmarkFrame::new()
            ))
            .is_err());

        let summary = session.summary();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.skipped_frames, 1);
        assert_eq!(summary.good_posture_ratio(), Some(1.0));
    }
}
