use crate::form_monitor::{secs_f64, FormRules};
use crate::landmarks::{Side, DEFAULT_MIN_VISIBILITY};
use crate::posture::PostureThresholds;
use crate::rep_counter::RepThresholds;
use crate::session::{CurlSettings, START_PROMPT_DELAY};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("contract threshold ({contract}) must be below extend threshold ({extend})")]
    RepThresholdsInverted { extend: f64, contract: f64 },
    #[error("unsafe band ({low}, {high}) is empty")]
    EmptyUnsafeBand { low: f64, high: f64 },
    #[error("min_visibility must be within [0, 1], got {0}")]
    VisibilityOutOfRange(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurlConfig {
    pub side: Side,
    pub thresholds: RepThresholds,
    pub form: FormRules,
    #[serde(with = "secs_f64")]
    pub start_prompt_delay: Duration,
}

impl Default for CurlConfig {
    fn default() -> Self {
        Self {
            side: Side::Left,
            thresholds: RepThresholds::default(),
            form: FormRules::default(),
            start_prompt_delay: START_PROMPT_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub min_visibility: f64,
    pub curl: CurlConfig,
    pub posture: PostureThresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_visibility: DEFAULT_MIN_VISIBILITY,
            curl: CurlConfig::default(),
            posture: PostureThresholds::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = self.curl.thresholds;
        if thresholds.contract >= thresholds.extend {
            return Err(ConfigError::RepThresholdsInverted {
                extend: thresholds.extend,
                contract: thresholds.contract,
            });
        }
        let form = &self.curl.form;
        if form.band_low >= form.band_high {
            return Err(ConfigError::EmptyUnsafeBand {
                low: form.band_low,
                high: form.band_high,
            });
        }
        if !(0.0..=1.0).contains(&self.min_visibility) {
            return Err(ConfigError::VisibilityOutOfRange(self.min_visibility));
        }
        Ok(())
    }

    pub fn curl_settings(&self) -> CurlSettings {
        CurlSettings {
            side: self.curl.side,
            min_visibility: self.min_visibility,
            thresholds: self.curl.thresholds,
            form: self.curl.form.clone(),
            start_prompt_delay: self.curl.start_prompt_delay,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "formcheck") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("formcheck_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// Missing or unreadable files fall back to the defaults.
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unparsable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
