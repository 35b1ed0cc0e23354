//! Configuration management for Clipferry.
//!
//! This module handles loading, saving, and managing Clipferry configuration.
//! Command-line flags override whatever is loaded here.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/clipferry/config.toml` |
//! | macOS | `~/Library/Application Support/com.clipferry.Clipferry/config.toml` |
//! | Windows | `%APPDATA%\clipferry\Clipferry\config\config.toml` |
//!
//! ## Example
//!
//! ```toml
//! [send]
//! chunk_size = "4m"
//! interval = "10s"
//!
//! [receive]
//! interval = "2s"
//! timeout = "5m"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clipboard::RetryPolicy;
use crate::codec::parse_chunk_size;
use crate::error::{Error, Result};

/// Main configuration struct for Clipferry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sender settings
    pub send: SendSection,
    /// Receiver settings
    pub receive: ReceiveSection,
    /// Clipboard settings
    pub clipboard: ClipboardSection,
}

/// Sender configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SendSection {
    /// Chunk size literal (`4m`, `512k`, `65536`)
    pub chunk_size: String,
    /// Pause between two frames
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    /// Sleep one interval before the first frame
    pub wait_first: bool,
    /// Publish on wall-clock multiples of the interval
    pub align: bool,
    /// Read each frame back after writing it
    pub verify_writes: bool,
}

impl Default for SendSection {
    fn default() -> Self {
        Self {
            chunk_size: "4m".to_string(),
            interval: crate::DEFAULT_SEND_INTERVAL,
            wait_first: false,
            align: false,
            verify_writes: false,
        }
    }
}

/// Receiver configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiveSection {
    /// Pause between two clipboard polls
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    /// Give up after this long without progress (`0s` waits forever)
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Directory for output files when no explicit path is given
    pub output_dir: Option<PathBuf>,
}

impl Default for ReceiveSection {
    fn default() -> Self {
        Self {
            interval: crate::DEFAULT_POLL_INTERVAL,
            timeout: Duration::ZERO,
            output_dir: None,
        }
    }
}

/// Clipboard access options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardSection {
    /// Attempts per clipboard operation, including the first
    pub retry_attempts: u32,
    /// First retry delay
    #[serde(with = "duration_serde")]
    pub retry_initial: Duration,
    /// Retry delay cap
    #[serde(with = "duration_serde")]
    pub retry_max: Duration,
}

impl Default for ClipboardSection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            retry_attempts: policy.attempts,
            retry_initial: policy.initial,
            retry_max: policy.max,
        }
    }
}

impl ClipboardSection {
    /// Retry policy described by this section.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            initial: self.retry_initial,
            max: self.retry_max,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Check values that would make a transfer impossible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] naming the first bad key.
    pub fn validate(&self) -> Result<()> {
        parse_chunk_size(&self.send.chunk_size).map_err(|_| {
            Error::invalid_config(
                "send.chunk_size",
                format!("'{}' is not a chunk size", self.send.chunk_size),
            )
        })?;
        if self.send.interval.is_zero() {
            return Err(Error::invalid_config("send.interval", "must be greater than 0"));
        }
        if self.receive.interval.is_zero() {
            return Err(Error::invalid_config("receive.interval", "must be greater than 0"));
        }
        if self.clipboard.retry_attempts == 0 {
            return Err(Error::invalid_config(
                "clipboard.retry_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Parsed `send.chunk_size`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the literal does not parse.
    pub fn chunk_size(&self) -> Result<usize> {
        parse_chunk_size(&self.send.chunk_size)
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "clipferry", "Clipferry")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }
}

/// Durations as `"200ms"`, `"10s"` or `"5m"`.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let text = if duration.subsec_nanos() != 0 {
            format!("{}ms", duration.as_millis())
        } else if duration.as_secs() >= 60 && duration.as_secs() % 60 == 0 {
            format!("{}m", duration.as_secs() / 60)
        } else {
            format!("{}s", duration.as_secs())
        };
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(s.trim()).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid duration '{s}', expected e.g. \"500ms\", \"10s\" or \"5m\""
            ))
        })
    }

    pub(super) fn parse(s: &str) -> Option<Duration> {
        if let Some(ms) = s.strip_suffix("ms") {
            return ms.trim().parse().ok().map(Duration::from_millis);
        }
        if let Some(secs) = s.strip_suffix('s') {
            return secs.trim().parse().ok().map(Duration::from_secs);
        }
        if let Some(mins) = s.strip_suffix('m') {
            return mins
                .trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs);
        }
        None
    }
}
