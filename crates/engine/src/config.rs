// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime tuning knobs.

use std::time::Duration;

/// Configuration the engine consumes. Per-path policy (retries, timeouts)
/// lives on the scan-path records; these are the process-wide defaults and
/// worker bounds.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Scanner worker pool size
    pub scanner_concurrency: usize,
    /// Coalesce ScanProgress to one per this many files...
    pub progress_every_files: u64,
    /// ...or one per this interval, whichever comes first
    pub progress_every: Duration,
    /// Retry ceiling for paths that don't set their own
    pub default_max_retries: u32,
    /// Verification timeout for paths that don't set their own
    pub default_verification_timeout: Duration,
    /// Verification poll interval for paths that don't set their own
    pub default_verification_interval: Duration,
    /// Throttle for DownloadProgress events per aggregate
    pub download_progress_every: Duration,
    /// Monitor: aggregates idle longer than this are stalled
    pub stall_threshold: Duration,
    /// Record detections but never remediate, regardless of path policy
    pub global_dry_run: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scanner_concurrency: 4,
            progress_every_files: 25,
            progress_every: Duration::from_secs(5),
            default_max_retries: 3,
            default_verification_timeout: Duration::from_secs(6 * 60 * 60),
            default_verification_interval: Duration::from_secs(30),
            download_progress_every: Duration::from_secs(30),
            stall_threshold: Duration::from_secs(30 * 60),
            global_dry_run: false,
        }
    }
}
