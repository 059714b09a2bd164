//! Optional TOML configuration.
//!
//! ```toml
//! [listen]
//! bind = "0.0.0.0"
//! port = 13001
//! width = 1
//! ramp = 0.01          # seconds
//! idle_period = 0.1    # seconds, 0 disables decay
//! idle_ramp = 1.0
//!
//! [record]
//! frame_rate = 24.0
//! width = 3
//! ramp = 0.01
//!
//! [playback]
//! frame_rate = 24.0
//! buffer = 24          # defaults to one second of frames
//! looping = true
//! ```
//!
//! Every key is optional; missing ones take the defaults shown.

use std::fs;
use std::path::Path;
use std::time::Duration;

use oscsig_core::{
    DEFAULT_FRAME_RATE, DEFAULT_IDLE_PERIOD, DEFAULT_IDLE_RAMP, DEFAULT_PORT, DEFAULT_RAMP,
    DEFAULT_WIDTH, RECORD_WIDTH, TreeConfig,
};
use serde::Deserialize;

use crate::error::{Result, StoreError};
use crate::periodic::frame_period;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub listen: ListenConfig,
    pub record: RecordConfig,
    pub playback: PlaybackConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ListenConfig {
    pub bind: String,
    pub port: u16,
    pub width: usize,
    pub ramp: f64,
    pub idle_period: f64,
    pub idle_ramp: f64,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            width: DEFAULT_WIDTH,
            ramp: DEFAULT_RAMP.as_secs_f64(),
            idle_period: DEFAULT_IDLE_PERIOD.as_secs_f64(),
            idle_ramp: DEFAULT_IDLE_RAMP.as_secs_f64(),
        }
    }
}

impl ListenConfig {
    /// Tree settings for a live tree with idle decay.
    pub fn tree_config(&self) -> Result<TreeConfig> {
        let idle_period = seconds("listen.idle_period", self.idle_period)?;
        Ok(TreeConfig {
            width: self.width,
            ramp: seconds("listen.ramp", self.ramp)?,
            idle_period: (!idle_period.is_zero()).then_some(idle_period),
            idle_ramp: seconds("listen.idle_ramp", self.idle_ramp)?,
        })
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RecordConfig {
    pub frame_rate: f64,
    pub width: usize,
    pub ramp: f64,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            width: RECORD_WIDTH,
            ramp: DEFAULT_RAMP.as_secs_f64(),
        }
    }
}

impl RecordConfig {
    /// Tree settings for the recorder's router: no decay, so every frame
    /// holds the last value each address received.
    pub fn tree_config(&self) -> Result<TreeConfig> {
        Ok(TreeConfig::without_decay(
            self.width,
            seconds("record.ramp", self.ramp)?,
        ))
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    pub frame_rate: f64,
    pub buffer: Option<usize>,
    pub looping: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            buffer: None,
            looping: true,
        }
    }
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let config: Config = toml::from_str(&text).map_err(|e| StoreError::Toml {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// `load` when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.listen.tree_config()?;
        self.record.tree_config()?;
        frame_period(self.record.frame_rate)?;
        frame_period(self.playback.frame_rate)?;
        if self.playback.buffer == Some(0) {
            return Err(StoreError::InvalidConfig(
                "playback.buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn seconds(key: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        StoreError::InvalidConfig(format!(
            "{key} must be a non-negative number of seconds, got {value}"
        ))
    })
}
