use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Lower (exclusive) edge of the unsafe elbow band.
pub const UNSAFE_BAND_LOW: f64 = 90.0;

/// Upper (exclusive) edge of the unsafe elbow band.
pub const UNSAFE_BAND_HIGH: f64 = 160.0;

/// Minimum spacing between two warnings.
pub const WARNING_COOLDOWN: Duration = Duration::from_secs(5);

pub const DEFAULT_WARNING_MESSAGE: &str = "Warning! Bad form detected. Keep your elbows in!";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormRules {
    pub band_low: f64,
    pub band_high: f64,
    #[serde(with = "secs_f64")]
    pub cooldown: Duration,
    pub message: String,
}

impl Default for FormRules {
    fn default() -> Self {
        Self {
            band_low: UNSAFE_BAND_LOW,
            band_high: UNSAFE_BAND_HIGH,
            cooldown: WARNING_COOLDOWN,
            message: DEFAULT_WARNING_MESSAGE.to_string(),
        }
    }
}

impl FormRules {
    pub fn in_unsafe_band(&self, angle: f64) -> bool {
        angle > self.band_low && angle < self.band_high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormMonitorState {
    pub last_warning_at: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadFormWarning {
    pub message: String,
}

impl fmt::Display for BadFormWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Debounced bad-form detector.
///
/// Fires when the angle sits inside the unsafe band, then stays quiet until
/// the cooldown has passed. Time comes from the caller so replays and tests
/// can drive it deterministically.
#[derive(Debug, Clone, Default)]
pub struct FormMonitor {
    rules: FormRules,
    state: FormMonitorState,
}

impl FormMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: FormRules) -> Self {
        Self {
            rules,
            state: FormMonitorState::default(),
        }
    }

    pub fn update(&mut self, angle: f64, now: Instant) -> Option<BadFormWarning> {
        if !self.rules.in_unsafe_band(angle) || self.cooling_down(now) {
            return None;
        }

        self.state.last_warning_at = Some(now);
        Some(BadFormWarning {
            message: self.rules.message.clone(),
        })
    }

    fn cooling_down(&self, now: Instant) -> bool {
        match self.state.last_warning_at {
            // checked_duration_since is None when `now` precedes the last warning
            Some(last) => now
                .checked_duration_since(last)
                .map_or(true, |elapsed| elapsed <= self.rules.cooldown),
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.state = FormMonitorState::default();
    }

    pub fn state(&self) -> FormMonitorState {
        self.state
    }
}

/// Serialize a [`Duration`] as fractional seconds.
pub(crate) mod secs_f64 {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
