use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregate::EventOrder;
use crate::error::ErrorCode;
use crate::watermark::DEFAULT_WATERMARK_FILE;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "tally.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub watermark: WatermarkConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkConfig {
    #[serde(default = "default_watermark_path")]
    pub path: PathBuf,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            path: default_watermark_path(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default)]
    pub order: EventOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl LockConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AggregatorConfig {
    /// Lock file guarding the watermark, next to it.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .watermark
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".lock");
        self.watermark.path.with_file_name(name)
    }
}

/// Load config from an explicit path.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<AggregatorConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| {
            format!(
                "{}: Failed to read {}",
                ErrorCode::FileReadFailed.code(),
                path.display()
            )
        })?;

    toml::from_str::<AggregatorConfig>(&content).with_context(|| {
        format!(
            "{}: Failed to parse {}",
            ErrorCode::ConfigParseError.code(),
            path.display()
        )
    })
}

/// Resolve the effective config.
///
/// An explicit path must exist. Otherwise `tally.toml` in `root` is used if
/// present, and defaults if not.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be read or parsed.
pub fn resolve_config(root: &Path, explicit: Option<&Path>) -> Result<AggregatorConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    let path = root.join(DEFAULT_CONFIG_FILE);
    if !path.exists() {
        return Ok(AggregatorConfig::default());
    }
    load_config(&path)
}

fn default_watermark_path() -> PathBuf {
    PathBuf::from(DEFAULT_WATERMARK_FILE)
}

const fn default_lock_timeout_ms() -> u64 {
    5_000
}
