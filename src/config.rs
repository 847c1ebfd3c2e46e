//! Machine configuration
//!
//! Settings are read from a JSON file; any field left out takes its
//! default. The command line can override individual fields afterwards.

use crate::io::TypingMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Compucolor II CPU clock.
pub const DEFAULT_CPU_FREQ: u64 = 1_996_800;
pub const DEFAULT_TIMESLICE_MS: u64 = 33;
pub const DEFAULT_HBLANK_WAIT_LIMIT: u32 = 4096;

/// How the runner paces emulated time against the host clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// Sleep out the rest of each timeslice
    #[default]
    Realtime,
    /// Run slices back to back
    Unthrottled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cpu_freq: u64,
    pub timeslice_ms: u64,
    /// 3 or 4; tied to the ROM version
    pub stepper_phases: u8,
    pub pacing: Pacing,
    pub rom: Option<PathBuf>,
    pub disks: [Option<PathBuf>; 2],
    /// Iterations of 4 ticks before a slow video access gives up waiting
    pub hblank_wait_limit: u32,
    /// How pasted text reaches BASIC
    pub autotype: TypingMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cpu_freq: DEFAULT_CPU_FREQ,
            timeslice_ms: DEFAULT_TIMESLICE_MS,
            stepper_phases: 3,
            pacing: Pacing::Realtime,
            rom: None,
            disks: [None, None],
            hblank_wait_limit: DEFAULT_HBLANK_WAIT_LIMIT,
            autotype: TypingMode::Lines,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {}", e),
            ConfigError::Json(e) => write!(f, "bad config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "bad config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}: {}, using defaults", path.as_ref().display(), e);
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.stepper_phases, 3 | 4) {
            return Err(ConfigError::Invalid(format!(
                "stepper_phases must be 3 or 4, not {}",
                self.stepper_phases
            )));
        }
        if self.cpu_freq == 0 || self.timeslice_ms == 0 {
            return Err(ConfigError::Invalid("cpu_freq and timeslice_ms must be non-zero".into()));
        }
        Ok(())
    }

    /// CPU ticks in one timeslice.
    pub fn slice_ticks(&self) -> u64 {
        self.cpu_freq * self.timeslice_ms / 1000
    }
}
