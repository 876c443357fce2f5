use crate::landmarks::{FrameError, LandmarkFrame, TimedFrame};
use serde::Deserialize;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Unified event type consumed by the frame runner
#[derive(Clone, Debug)]
pub enum FrameEvent {
    Frame(TimedFrame),
    EndOfStream,
    Tick,
}

/// Source of landmark frames from the pose collaborator
pub trait FrameSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<FrameEvent, RecvTimeoutError>;
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("invalid frame json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("frame has neither `landmarks` nor `pose`")]
    NoLandmarks,
    #[error("frame timestamp {0} is not a finite, non-negative number of seconds")]
    BadTimestamp(f64),
}

/// One JSON line as written by the pose collaborator.
#[derive(Debug, Deserialize)]
struct FrameRecord {
    t: Option<f64>,
    landmarks: Option<LandmarkFrame>,
    pose: Option<Vec<[f64; 3]>>,
}

/// Parse one JSON line into a frame.
///
/// `t` is seconds since `stream_start`; frames without it are stamped with
/// the current instant.
pub fn parse_frame_line(line: &str, stream_start: Instant) -> Result<TimedFrame, InputError> {
    let record: FrameRecord = serde_json::from_str(line)?;

    let frame = match (record.landmarks, record.pose) {
        (Some(landmarks), _) => landmarks,
        (None, Some(pose)) => LandmarkFrame::from_mediapipe(&pose)?,
        (None, None) => return Err(InputError::NoLandmarks),
    };

    let at = match record.t {
        Some(t) => {
            let offset = Duration::try_from_secs_f64(t).map_err(|_| InputError::BadTimestamp(t))?;
            stream_start
                .checked_add(offset)
                .ok_or(InputError::BadTimestamp(t))?
        }
        None => Instant::now(),
    };

    Ok(TimedFrame::new(at, frame))
}

/// Frame source reading JSON lines on a background thread
pub struct ReaderFrameSource {
    rx: Receiver<FrameEvent>,
}

impl ReaderFrameSource {
    pub fn spawn<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel();
        let stream_start = Instant::now();

        std::thread::spawn(move || {
            for (idx, line) in reader.lines().enumerate() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "frame input closed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_frame_line(&line, stream_start) {
                    Ok(frame) => {
                        if tx.send(FrameEvent::Frame(frame)).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(line = idx + 1, error = %e, "skipping malformed frame"),
                }
            }
            let _ = tx.send(FrameEvent::EndOfStream);
        });

        Self { rx }
    }
}

impl FrameSource for ReaderFrameSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<FrameEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test frame source for unit tests
pub struct TestFrameSource {
    rx: Receiver<FrameEvent>,
}

impl TestFrameSource {
    pub fn new(rx: Receiver<FrameEvent>) -> Self {
        Self { rx }
    }
}

impl FrameSource for TestFrameSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<FrameEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances a session one frame/tick at a time
pub struct Runner<S: FrameSource, T: Ticker> {
    source: S,
    ticker: T,
}

impl<S: FrameSource, T: Ticker> Runner<S, T> {
    pub fn new(source: S, ticker: T) -> Self {
        Self { source, ticker }
    }

    /// Blocks up to the tick interval and returns the next event.
    /// A timeout yields `Tick`; a dropped producer yields `EndOfStream`.
    pub fn step(&self) -> FrameEvent {
        match self.source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => FrameEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => FrameEvent::EndOfStream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2D;
    use crate::landmarks::LandmarkId;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(
            TestFrameSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );
        assert_matches!(runner.step(), FrameEvent::Tick);
    }

    #[test]
    fn step_reports_end_when_producer_is_gone() {
        let (tx, rx) = mpsc::channel::<FrameEvent>();
        drop(tx);
        let runner = Runner::new(
            TestFrameSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );
        assert_matches!(runner.step(), FrameEvent::EndOfStream);
    }

    #[test]
    fn step_passes_through_frames() {
        let (tx, rx) = mpsc::channel();
        tx.send(FrameEvent::Frame(TimedFrame::new(
            Instant::now(),
            LandmarkFrame::new(),
        )))
        .unwrap();
        let runner = Runner::new(
            TestFrameSource::new(rx),
            FixedTicker::new(Duration::from_millis(10)),
        );
        assert_matches!(runner.step(), FrameEvent::Frame(_));
    }

    #[test]
    fn parse_named_landmarks_with_time() {
        let start = Instant::now();
        let line = r#"{"t": 1.5, "landmarks": {"LEFT_ELBOW": {"x": 0.5, "y": 0.6}}}"#;
        let frame = parse_frame_line(line, start).unwrap();

        assert_eq!(frame.at, start + Duration::from_millis(1500));
        assert_eq!(
            frame.frame.get(LandmarkId::LeftElbow).map(|l| l.point),
            Some(Point2D::new(0.5, 0.6))
        );
    }

    #[test]
    fn parse_mediapipe_pose_array() {
        let pose: Vec<[f64; 3]> = (0..33).map(|i| [i as f64 / 40.0, 0.5, 1.0]).collect();
        let line = serde_json::json!({ "t": 0.0, "pose": pose }).to_string();
        let frame = parse_frame_line(&line, Instant::now()).unwrap();
        let wrist = frame.frame.get(LandmarkId::RightWrist).unwrap();
        assert_eq!(wrist.point, Point2D::new(16.0 / 40.0, 0.5));
    }

    #[test]
    fn parse_rejects_bad_input() {
        let start = Instant::now();
        assert_matches!(parse_frame_line("not json", start), Err(InputError::Json(_)));
        assert_matches!(parse_frame_line(r#"{"t": 1.0}"#, start), Err(InputError::NoLandmarks));
        assert_matches!(
            parse_frame_line(r#"{"t": -1.0, "landmarks": {}}"#, start),
            Err(InputError::BadTimestamp(_))
        );
        assert_matches!(
            parse_frame_line(r#"{"t": 1.5e19, "landmarks": {}}"#, start),
            Err(InputError::BadTimestamp(_))
        );
        assert_matches!(
            parse_frame_line(r#"{"pose": [[0.1, 0.2, 0.9]]}"#, start),
            Err(InputError::Frame(FrameError::WrongLandmarkCount { .. }))
        );
    }

    #[test]
    fn reader_source_skips_malformed_lines_and_ends() {
        let input = concat!(
            r#"{"t": 0.0, "landmarks": {"NOSE": {"x": 0.5, "y": 0.1}}}"#,
            "\n",
            "garbage\n",
            "\n",
            r#"{"t": 0.1, "landmarks": {"NOSE": {"x": 0.5, "y": 0.2}}}"#,
            "\n",
        );
        let runner = Runner::new(
            ReaderFrameSource::spawn(Cursor::new(input.to_string())),
            FixedTicker::new(Duration::from_secs(1)),
        );

        let mut frames = 0;
        loop {
            match runner.step() {
                FrameEvent::Frame(_) => frames += 1,
                FrameEvent::Tick => {}
                FrameEvent::EndOfStream => break,
            }
        }
        assert_eq!(frames, 2);
    }

    #[test]
    fn reader_source_survives_out_of_range_timestamp() {
        let input = concat!(
            r#"{"t": 1.5e19, "landmarks": {"NOSE": {"x": 0.5, "y": 0.1}}}"#,
            "\n",
            r#"{"t": 0.1, "landmarks": {"NOSE": {"x": 0.5, "y": 0.2}}}"#,
            "\n",
        );
        let runner = Runner::new(
            ReaderFrameSource::spawn(Cursor::new(input.to_string())),
            FixedTicker::new(Duration::from_secs(1)),
        );

        let mut frames = Vec::new();
        loop {
            match runner.step() {
                FrameEvent::Frame(frame) => frames.push(frame),
                FrameEvent::Tick => {}
                FrameEvent::EndOfStream => break,
            }
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].frame.get(LandmarkId::Nose).map(|l| l.point),
            Some(Point2D::new(0.5, 0.2))
        );
    }
}
