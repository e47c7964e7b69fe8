// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! A single TOML file describes the process knobs plus the operator's
//! scan paths, manager instances and schedules. The data directory can
//! be overridden with `MENDARR_DATA_DIR`.

use mendarr_core::{ArrInstance, ScanPathConfig, ScheduleConfig};
use mendarr_engine::RuntimeConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not determine a data directory; set data_dir or MENDARR_DATA_DIR")]
    NoDataDir,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_retention_days() -> u32 {
    30
}

fn default_backup_retain() -> usize {
    5
}

fn default_backup_interval_hours() -> u64 {
    24
}

fn default_probe_bin() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_probe_timeout_secs() -> u64 {
    60
}

fn default_rps() -> f64 {
    5.0
}

fn default_burst() -> u32 {
    10
}

fn default_verification_timeout_secs() -> u64 {
    6 * 60 * 60
}

fn default_verification_interval_secs() -> u64 {
    30
}

fn default_scanner_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_stall_threshold_secs() -> u64 {
    30 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_rps")]
    pub rps: f64,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            rps: default_rps(),
            burst: default_burst(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSettings {
    #[serde(default = "default_verification_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_verification_interval_secs")]
    pub interval_secs: u64,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_verification_timeout_secs(),
            interval_secs: default_verification_interval_secs(),
        }
    }
}

/// The daemon's configuration file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DaemonConfig {
    /// Data directory holding the WAL, snapshot, backups and logs
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Record detections, never remediate
    #[serde(default)]
    pub dry_run: bool,
    /// Days of history to keep; 0 disables retention pruning
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_backup_retain")]
    pub backup_retain: usize,
    #[serde(default = "default_backup_interval_hours")]
    pub backup_interval_hours: u64,
    /// base64 32-byte key for credential encryption at rest
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Permit manager base URLs on loopback/private ranges
    #[serde(default)]
    pub allow_private_urls: bool,
    /// Media probe binary (ffprobe-compatible)
    #[serde(default = "default_probe_bin")]
    pub probe_bin: PathBuf,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_scanner_concurrency")]
    pub scanner_concurrency: usize,
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    #[serde(default = "default_stall_threshold_secs")]
    pub stall_threshold_secs: u64,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub verification: VerificationSettings,
    #[serde(default)]
    pub scan_paths: Vec<ScanPathConfig>,
    #[serde(default)]
    pub instances: Vec<ArrInstance>,
    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,
}

/// Resolved file layout under the data directory.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub data_dir: PathBuf,
    pub wal_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub backups_dir: PathBuf,
    pub log_path: PathBuf,
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
}

impl DaemonConfig {
    /// Load from a TOML file. A missing file yields the defaults so a
    /// bare daemon can still start and be configured later.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The effective data directory: config value, `MENDARR_DATA_DIR`,
    /// or `$XDG_STATE_HOME/mendarr` (falling back to
    /// `~/.local/state/mendarr`).
    pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Ok(dir) = std::env::var("MENDARR_DATA_DIR") {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
            if !state_home.is_empty() {
                return Ok(PathBuf::from(state_home).join("mendarr"));
            }
        }
        if let Ok(home) = std::env::var("HOME") {
            if !home.is_empty() {
                return Ok(PathBuf::from(home).join(".local/state/mendarr"));
            }
        }
        Err(ConfigError::NoDataDir)
    }

    pub fn store_paths(&self) -> Result<StorePaths, ConfigError> {
        let data_dir = self.resolve_data_dir()?;
        Ok(StorePaths {
            wal_path: data_dir.join("wal").join("events.wal"),
            snapshot_path: data_dir.join("snapshot.zst"),
            backups_dir: data_dir.join("backups"),
            log_path: data_dir.join("mendarrd.log"),
            lock_path: data_dir.join("mendarrd.pid"),
            version_path: data_dir.join("mendarrd.version"),
            data_dir,
        })
    }

    /// The engine's view of this configuration.
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            scanner_concurrency: self.scanner_concurrency,
            default_max_retries: self.default_max_retries,
            default_verification_timeout: Duration::from_secs(self.verification.timeout_secs),
            default_verification_interval: Duration::from_secs(self.verification.interval_secs),
            stall_threshold: Duration::from_secs(self.stall_threshold_secs),
            global_dry_run: self.dry_run,
            ..RuntimeConfig::default()
        }
    }

    pub fn retention_cutoff(&self, now_ms: u64) -> Option<u64> {
        if self.retention_days == 0 {
            return None;
        }
        Some(now_ms.saturating_sub(u64::from(self.retention_days) * 24 * 60 * 60 * 1000))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
