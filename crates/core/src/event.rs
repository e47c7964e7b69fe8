// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the mendarr system.
//!
//! Corruption and scan events are the durable record of everything that
//! happens to the library; the remaining variants are control and
//! configuration events that keep the materialized state current.

use crate::corruption::CorruptionEventKind;
use crate::health::CorruptionKind;
use crate::id::{CorruptionId, InstanceId, ScanPathId, ScheduleId};
use crate::instance::ArrInstance;
use crate::policy::{ScanPathConfig, ScheduleConfig};
use crate::scan::{ScanFileStatus, ScanId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Events that drive state transitions in the system.
///
/// Serializes with `{"type": "kind:subkind", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- corruption lifecycle --
    #[serde(rename = "corruption:detected")]
    CorruptionDetected {
        id: CorruptionId,
        file_path: PathBuf,
        scan_path_id: ScanPathId,
        corruption_type: CorruptionKind,
        detail: String,
    },

    #[serde(rename = "remediation:started")]
    RemediationStarted {
        id: CorruptionId,
        item_id: u64,
        file_id: u64,
        instance_id: InstanceId,
    },

    #[serde(rename = "remediation:failed")]
    RemediationFailed { id: CorruptionId, error: String },

    #[serde(rename = "deletion:started")]
    DeletionStarted { id: CorruptionId },

    #[serde(rename = "deletion:completed")]
    DeletionCompleted { id: CorruptionId },

    #[serde(rename = "deletion:failed")]
    DeletionFailed { id: CorruptionId, error: String },

    #[serde(rename = "search:started")]
    SearchStarted { id: CorruptionId },

    #[serde(rename = "search:completed")]
    SearchCompleted { id: CorruptionId },

    #[serde(rename = "search:failed")]
    SearchFailed { id: CorruptionId, error: String },

    /// The replacement file appeared on disk at the expected path
    #[serde(rename = "file:detected")]
    FileDetected { id: CorruptionId, file_path: PathBuf },

    #[serde(rename = "download:queued")]
    DownloadQueued { id: CorruptionId },

    #[serde(rename = "download:progress")]
    DownloadProgress {
        id: CorruptionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percent: Option<u8>,
    },

    #[serde(rename = "import:started")]
    ImportStarted { id: CorruptionId },

    /// The manager cannot (re-)import the item; terminal
    #[serde(rename = "import:blocked")]
    ImportBlocked { id: CorruptionId, reason: String },

    #[serde(rename = "verification:started")]
    VerificationStarted { id: CorruptionId, file_path: PathBuf },

    #[serde(rename = "verification:success")]
    VerificationSuccess { id: CorruptionId },

    #[serde(rename = "verification:failed")]
    VerificationFailed { id: CorruptionId, error: String },

    #[serde(rename = "corruption:max_retries")]
    MaxRetriesReached { id: CorruptionId, retry_count: u32 },

    #[serde(rename = "corruption:ignored")]
    CorruptionIgnored { id: CorruptionId },

    #[serde(rename = "corruption:manually_removed")]
    ManuallyRemoved { id: CorruptionId },

    // -- scan lifecycle --
    /// Request to start a scan of a configured path (operator or scheduler)
    #[serde(rename = "scan:requested")]
    ScanRequested {
        scan_path_id: ScanPathId,
        /// Scan a sub-root instead of the configured local root
        #[serde(default, skip_serializing_if = "Option::is_none")]
        root: Option<PathBuf>,
    },

    /// Scan record created in `queued`
    #[serde(rename = "scan:queued")]
    ScanQueued {
        scan_id: ScanId,
        scan_path_id: ScanPathId,
        root: PathBuf,
    },

    #[serde(rename = "scan:started")]
    ScanStarted {
        scan_id: ScanId,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        resumed: bool,
    },

    /// Coalesced progress counters (at most one per N files or T seconds)
    #[serde(rename = "scan:progress")]
    ScanProgress {
        scan_id: ScanId,
        files_seen: u64,
        files_scanned: u64,
        corruptions_found: u64,
    },

    /// Per-file outcome; lets a restarted scan skip unchanged healthy files
    #[serde(rename = "scan:file")]
    ScanFileRecorded {
        scan_id: ScanId,
        file_path: PathBuf,
        status: ScanFileStatus,
        size: u64,
        modified_ms: u64,
    },

    #[serde(rename = "scan:completed")]
    ScanCompleted {
        scan_id: ScanId,
        files_scanned: u64,
        corruptions_found: u64,
    },

    /// Cancel requested; workers drain before `scan:cancelled` lands
    #[serde(rename = "scan:cancel")]
    ScanCancelRequested { scan_id: ScanId },

    #[serde(rename = "scan:cancelled")]
    ScanCancelled { scan_id: ScanId },

    #[serde(rename = "scan:paused")]
    ScanPaused { scan_id: ScanId },

    #[serde(rename = "scan:failed")]
    ScanFailed { scan_id: ScanId, error: String },

    // -- rescan queue --
    #[serde(rename = "rescan:queued")]
    RescanQueued {
        file_path: PathBuf,
        scan_path_id: ScanPathId,
        reason: String,
        #[serde(default)]
        attempts: u32,
        next_retry_at_ms: u64,
    },

    #[serde(rename = "rescan:resolved")]
    RescanResolved { file_path: PathBuf },

    // -- configuration --
    #[serde(rename = "scan_path:configured")]
    ScanPathConfigured { config: ScanPathConfig },

    #[serde(rename = "scan_path:removed")]
    ScanPathRemoved { id: ScanPathId },

    #[serde(rename = "arr:configured")]
    ArrInstanceConfigured { instance: ArrInstance },

    #[serde(rename = "schedule:added")]
    ScheduleAdded { schedule: ScheduleConfig },

    #[serde(rename = "schedule:removed")]
    ScheduleRemoved { id: ScheduleId },

    #[serde(rename = "schedule:fired")]
    ScheduleFired { id: ScheduleId, fired_at_ms: u64 },

    #[serde(rename = "setting:updated")]
    SettingUpdated { key: String, value: String },

    // -- control --
    /// Never replayed from the WAL
    #[serde(rename = "shutdown")]
    Shutdown,
}

impl Event {
    /// The corruption aggregate this event belongs to, if any.
    pub fn corruption_id(&self) -> Option<&CorruptionId> {
        match self {
            Event::CorruptionDetected { id, .. }
            | Event::RemediationStarted { id, .. }
            | Event::RemediationFailed { id, .. }
            | Event::DeletionStarted { id }
            | Event::DeletionCompleted { id }
            | Event::DeletionFailed { id, .. }
            | Event::SearchStarted { id }
            | Event::SearchCompleted { id }
            | Event::SearchFailed { id, .. }
            | Event::FileDetected { id, .. }
            | Event::DownloadQueued { id }
            | Event::DownloadProgress { id, .. }
            | Event::ImportStarted { id }
            | Event::ImportBlocked { id, .. }
            | Event::VerificationStarted { id, .. }
            | Event::VerificationSuccess { id }
            | Event::VerificationFailed { id, .. }
            | Event::MaxRetriesReached { id, .. }
            | Event::CorruptionIgnored { id }
            | Event::ManuallyRemoved { id } => Some(id),
            _ => None,
        }
    }

    /// The scan aggregate this event belongs to, if any.
    pub fn scan_id(&self) -> Option<ScanId> {
        match self {
            Event::ScanQueued { scan_id, .. }
            | Event::ScanStarted { scan_id, .. }
            | Event::ScanProgress { scan_id, .. }
            | Event::ScanFileRecorded { scan_id, .. }
            | Event::ScanCompleted { scan_id, .. }
            | Event::ScanCancelRequested { scan_id }
            | Event::ScanCancelled { scan_id }
            | Event::ScanPaused { scan_id }
            | Event::ScanFailed { scan_id, .. } => Some(*scan_id),
            _ => None,
        }
    }

    /// The corruption state-machine kind of this event, if it is one of the
    /// canonical corruption kinds.
    pub fn corruption_kind(&self) -> Option<CorruptionEventKind> {
        let kind = match self {
            Event::CorruptionDetected { .. } => CorruptionEventKind::CorruptionDetected,
            Event::RemediationStarted { .. } => CorruptionEventKind::RemediationStarted,
            Event::RemediationFailed { .. } => CorruptionEventKind::RemediationFailed,
            Event::DeletionStarted { .. } => CorruptionEventKind::DeletionStarted,
            Event::DeletionCompleted { .. } => CorruptionEventKind::DeletionCompleted,
            Event::DeletionFailed { .. } => CorruptionEventKind::DeletionFailed,
            Event::SearchStarted { .. } => CorruptionEventKind::SearchStarted,
            Event::SearchCompleted { .. } => CorruptionEventKind::SearchCompleted,
            Event::SearchFailed { .. } => CorruptionEventKind::SearchFailed,
            Event::FileDetected { .. } => CorruptionEventKind::FileDetected,
            Event::DownloadQueued { .. } => CorruptionEventKind::DownloadQueued,
            Event::DownloadProgress { .. } => CorruptionEventKind::DownloadProgress,
            Event::ImportStarted { .. } => CorruptionEventKind::ImportStarted,
            Event::ImportBlocked { .. } => CorruptionEventKind::ImportBlocked,
            Event::VerificationStarted { .. } => CorruptionEventKind::VerificationStarted,
            Event::VerificationSuccess { .. } => CorruptionEventKind::VerificationSuccess,
            Event::VerificationFailed { .. } => CorruptionEventKind::VerificationFailed,
            Event::MaxRetriesReached { .. } => CorruptionEventKind::MaxRetriesReached,
            Event::CorruptionIgnored { .. } => CorruptionEventKind::CorruptionIgnored,
            Event::ManuallyRemoved { .. } => CorruptionEventKind::ManuallyRemoved,
            _ => return None,
        };
        Some(kind)
    }

    /// The error payload carried by failure events.
    pub fn error_detail(&self) -> Option<&str> {
        match self {
            Event::RemediationFailed { error, .. }
            | Event::DeletionFailed { error, .. }
            | Event::SearchFailed { error, .. }
            | Event::VerificationFailed { error, .. }
            | Event::ScanFailed { error, .. } => Some(error),
            Event::ImportBlocked { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// One-line summary for logging.
    pub fn log_summary(&self) -> String {
        if let Some(kind) = self.corruption_kind() {
            let id = self.corruption_id().map(|i| i.short(8)).unwrap_or_default();
            return match self {
                Event::CorruptionDetected {
                    file_path,
                    corruption_type,
                    ..
                } => format!(
                    "{} {} {} ({})",
                    kind,
                    id,
                    file_path.display(),
                    corruption_type
                ),
                _ => format!("{} {}", kind, id),
            };
        }
        match self {
            Event::ScanProgress {
                scan_id,
                files_scanned,
                files_seen,
                ..
            } => format!("scan:progress #{} {}/{}", scan_id, files_scanned, files_seen),
            Event::ScanFileRecorded {
                scan_id, file_path, ..
            } => format!("scan:file #{} {}", scan_id, file_path.display()),
            other => serde_json::to_value(other)
                .ok()
                .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(String::from))
                .unwrap_or_else(|| "event".to_string()),
        }
    }
}

/// An event as persisted: the monotonic store id, creation timestamp and
/// payload. Per aggregate, ids are strictly increasing in append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: u64,
    pub created_at_ms: u64,
    pub event: Event,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
