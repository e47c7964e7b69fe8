// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan records: one traversal of a configured root.

use crate::id::ScanPathId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier for a scan. Monotonic, assigned by the store when the scan
/// record is created.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct ScanId(pub u64);

impl ScanId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a scan through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Queued,
    Running,
    Paused,
    Completed,
    Cancelled,
    Error,
}

impl ScanStatus {
    /// Terminal scans are never resumed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Cancelled | ScanStatus::Error
        )
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScanStatus::Queued => "queued",
            ScanStatus::Running => "running",
            ScanStatus::Paused => "paused",
            ScanStatus::Completed => "completed",
            ScanStatus::Cancelled => "cancelled",
            ScanStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// A scan record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: ScanId,
    pub scan_path_id: ScanPathId,
    pub root: PathBuf,
    pub status: ScanStatus,
    pub files_seen: u64,
    pub files_scanned: u64,
    pub corruptions_found: u64,
    pub queued_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when a cancel was requested but workers have not drained yet
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelling: bool,
}

impl Scan {
    pub fn new(id: ScanId, scan_path_id: ScanPathId, root: PathBuf, queued_at_ms: u64) -> Self {
        Self {
            id,
            scan_path_id,
            root,
            status: ScanStatus::Queued,
            files_seen: 0,
            files_scanned: 0,
            corruptions_found: 0,
            queued_at_ms,
            started_at_ms: None,
            completed_at_ms: None,
            error: None,
            cancelling: false,
        }
    }
}

/// Per-file outcome recorded during a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanFileStatus {
    Healthy,
    Corrupt,
    Inaccessible,
}

/// A visited file within a scan.
///
/// Size and mtime let a resumed scan skip files recorded healthy and
/// unchanged since the last visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFile {
    pub path: PathBuf,
    pub status: ScanFileStatus,
    pub size: u64,
    pub modified_ms: u64,
    pub checked_at_ms: u64,
}

impl ScanFile {
    /// A resumed scan skips this file when it was healthy and size+mtime
    /// still match.
    pub fn is_unchanged_healthy(&self, size: u64, modified_ms: u64) -> bool {
        self.status == ScanFileStatus::Healthy && self.size == size && self.modified_ms == modified_ms
    }
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
