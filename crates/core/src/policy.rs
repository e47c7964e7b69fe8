// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan-path policy and schedule configuration.

use crate::id::{InstanceId, ScanPathId, ScheduleId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How the health checker probes a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Probe stream/container metadata only (fast)
    #[default]
    Quick,
    /// Read through every packet (slow, catches mid-file damage)
    FullDecode,
}

fn default_max_retries() -> u32 {
    3
}

fn default_verification_timeout_secs() -> u64 {
    6 * 60 * 60
}

fn default_verification_interval_secs() -> u64 {
    30
}

/// A configured scan path: a local root mapped to an external-manager root,
/// plus the remediation policy applied to files found beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPathConfig {
    pub id: ScanPathId,
    /// Root on the local filesystem that the scanner walks
    pub local_root: PathBuf,
    /// The same root as the external manager sees it
    pub remote_root: PathBuf,
    /// Which configured manager instance owns files under this root
    pub instance_id: InstanceId,
    pub enabled: bool,
    /// When false, detections stay in place for manual handling
    pub auto_remediate: bool,
    /// When true, detections are recorded but nothing is remediated
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub detection_method: DetectionMethod,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_verification_timeout_secs")]
    pub verification_timeout_secs: u64,
    #[serde(default = "default_verification_interval_secs")]
    pub verification_interval_secs: u64,
}

impl ScanPathConfig {
    pub fn verification_timeout(&self) -> Duration {
        Duration::from_secs(self.verification_timeout_secs)
    }

    pub fn verification_interval(&self) -> Duration {
        Duration::from_secs(self.verification_interval_secs)
    }

    /// Remediation proceeds only for enabled, auto-remediate, non-dry-run paths.
    pub fn remediation_allowed(&self, global_dry_run: bool) -> bool {
        self.enabled && self.auto_remediate && !self.dry_run && !global_dry_run
    }
}

/// A schedule record: fire a scan of one path on a cron expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub id: ScheduleId,
    pub scan_path_id: ScanPathId,
    /// Standard 5-field cron expression (minute hour dom month dow)
    pub cron: String,
    pub enabled: bool,
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
