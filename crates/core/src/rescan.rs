// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-rescan queue entries.
//!
//! Files that fail a health check with inaccessibility (lost mount,
//! permission error, probe timeout) are never treated as corrupt. They are
//! queued here and re-checked with exponential backoff.

use crate::id::ScanPathId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on re-check attempts before the entry is dropped.
pub const MAX_RESCAN_ATTEMPTS: u32 = 5;

/// Base delay before the first re-check.
const BASE_DELAY: Duration = Duration::from_secs(60);

/// Cap on the backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(60 * 60);

/// Backoff delay before attempt `attempts + 1` (doubling, capped).
pub fn rescan_backoff(attempts: u32) -> Duration {
    let shift = attempts.min(6);
    (BASE_DELAY * (1u32 << shift)).min(MAX_DELAY)
}

/// A durable entry in the pending-rescan queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRescan {
    pub file_path: PathBuf,
    pub scan_path_id: ScanPathId,
    pub reason: String,
    pub attempts: u32,
    pub next_retry_at_ms: u64,
}

impl PendingRescan {
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.next_retry_at_ms <= now_ms
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= MAX_RESCAN_ATTEMPTS
    }
}

#[cfg(test)]
#[path = "rescan_tests.rs"]
mod tests;
