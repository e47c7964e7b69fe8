// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The corruption state machine.
//!
//! A corruption aggregate's state is the kind of its latest event. The fold
//! over its events derives everything the views report: current state, retry
//! count, last error, timestamps. Terminal states accept no further events.

use crate::event::{Event, StoredEvent};
use crate::health::CorruptionKind;
use crate::id::{CorruptionId, InstanceId, ScanPathId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The canonical corruption event kinds, in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionEventKind {
    CorruptionDetected,
    RemediationStarted,
    RemediationFailed,
    DeletionStarted,
    DeletionCompleted,
    DeletionFailed,
    SearchStarted,
    SearchCompleted,
    SearchFailed,
    FileDetected,
    DownloadQueued,
    DownloadProgress,
    ImportStarted,
    ImportBlocked,
    VerificationStarted,
    VerificationSuccess,
    VerificationFailed,
    MaxRetriesReached,
    CorruptionIgnored,
    ManuallyRemoved,
}

/// The kinds that count toward an aggregate's retry total.
///
/// An explicit list, not a name-suffix match: `ScanFailed` belongs to the
/// scan aggregate and must never count here.
pub const FAILURE_KINDS: [CorruptionEventKind; 4] = [
    CorruptionEventKind::RemediationFailed,
    CorruptionEventKind::DeletionFailed,
    CorruptionEventKind::SearchFailed,
    CorruptionEventKind::VerificationFailed,
];

impl CorruptionEventKind {
    /// Terminal states accept no further events.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CorruptionEventKind::VerificationSuccess
                | CorruptionEventKind::MaxRetriesReached
                | CorruptionEventKind::CorruptionIgnored
                | CorruptionEventKind::ImportBlocked
                | CorruptionEventKind::ManuallyRemoved
        )
    }

    /// Whether this kind counts toward the retry ceiling.
    pub fn is_failure(self) -> bool {
        FAILURE_KINDS.contains(&self)
    }

    /// Whether this kind puts the aggregate in the `in_progress` dashboard
    /// class: remediation or verification is actively underway.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            CorruptionEventKind::RemediationStarted
                | CorruptionEventKind::DeletionStarted
                | CorruptionEventKind::DeletionCompleted
                | CorruptionEventKind::SearchStarted
                | CorruptionEventKind::SearchCompleted
                | CorruptionEventKind::FileDetected
                | CorruptionEventKind::DownloadQueued
                | CorruptionEventKind::DownloadProgress
                | CorruptionEventKind::ImportStarted
                | CorruptionEventKind::VerificationStarted
        )
    }

    /// Whether a restarted daemon should re-arm a verification waiter for an
    /// aggregate whose latest event is this kind.
    pub fn awaits_verification(self) -> bool {
        matches!(
            self,
            CorruptionEventKind::SearchCompleted
                | CorruptionEventKind::DownloadQueued
                | CorruptionEventKind::DownloadProgress
                | CorruptionEventKind::ImportStarted
                | CorruptionEventKind::FileDetected
                | CorruptionEventKind::VerificationStarted
        )
    }

    /// Transition rule: may an event of this kind follow `prev`?
    ///
    /// `prev` is `None` for a fresh aggregate, where only
    /// `CorruptionDetected` is accepted. Terminal states accept nothing.
    /// `CorruptionDetected` never repeats.
    pub fn may_follow(self, prev: Option<CorruptionEventKind>) -> bool {
        match prev {
            None => self == CorruptionEventKind::CorruptionDetected,
            Some(p) if p.is_terminal() => false,
            Some(_) => self != CorruptionEventKind::CorruptionDetected,
        }
    }
}

impl std::fmt::Display for CorruptionEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CorruptionEventKind::CorruptionDetected => "corruption:detected",
            CorruptionEventKind::RemediationStarted => "remediation:started",
            CorruptionEventKind::RemediationFailed => "remediation:failed",
            CorruptionEventKind::DeletionStarted => "deletion:started",
            CorruptionEventKind::DeletionCompleted => "deletion:completed",
            CorruptionEventKind::DeletionFailed => "deletion:failed",
            CorruptionEventKind::SearchStarted => "search:started",
            CorruptionEventKind::SearchCompleted => "search:completed",
            CorruptionEventKind::SearchFailed => "search:failed",
            CorruptionEventKind::FileDetected => "file:detected",
            CorruptionEventKind::DownloadQueued => "download:queued",
            CorruptionEventKind::DownloadProgress => "download:progress",
            CorruptionEventKind::ImportStarted => "import:started",
            CorruptionEventKind::ImportBlocked => "import:blocked",
            CorruptionEventKind::VerificationStarted => "verification:started",
            CorruptionEventKind::VerificationSuccess => "verification:success",
            CorruptionEventKind::VerificationFailed => "verification:failed",
            CorruptionEventKind::MaxRetriesReached => "corruption:max_retries",
            CorruptionEventKind::CorruptionIgnored => "corruption:ignored",
            CorruptionEventKind::ManuallyRemoved => "corruption:manually_removed",
        };
        write!(f, "{}", s)
    }
}

/// Coarse-grained dashboard classification of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    /// Non-terminal: detection recorded or remediation underway
    Active,
    /// Replacement verified healthy
    Resolved,
    /// Retry ceiling reached
    Orphaned,
    /// Operator attention required (import blocked / manually removed)
    ManualIntervention,
    /// Excluded from all dashboard counts
    Ignored,
}

/// The fold of a corruption aggregate's events: everything the status view
/// reports, recomputable from events alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptionStatus {
    pub id: CorruptionId,
    pub file_path: PathBuf,
    pub scan_path_id: ScanPathId,
    pub corruption_type: CorruptionKind,
    pub detail: String,
    pub state: CorruptionEventKind,
    pub retry_count: u32,
    pub detected_at_ms: u64,
    pub last_updated_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Manager item resolved during remediation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<InstanceId>,
    /// Replacement path reported by verification, when it differs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_path: Option<PathBuf>,
}

impl CorruptionStatus {
    /// Fold an aggregate's events. Returns `None` when the slice is empty or
    /// does not begin with `CorruptionDetected`.
    pub fn fold(events: &[StoredEvent]) -> Option<Self> {
        let first = events.first()?;
        let (id, file_path, scan_path_id, corruption_type, detail) = match &first.event {
            Event::CorruptionDetected {
                id,
                file_path,
                scan_path_id,
                corruption_type,
                detail,
            } => (
                id.clone(),
                file_path.clone(),
                scan_path_id.clone(),
                *corruption_type,
                detail.clone(),
            ),
            _ => return None,
        };

        let mut status = CorruptionStatus {
            id,
            file_path,
            scan_path_id,
            corruption_type,
            detail,
            state: CorruptionEventKind::CorruptionDetected,
            retry_count: 0,
            detected_at_ms: first.created_at_ms,
            last_updated_ms: first.created_at_ms,
            last_error: None,
            item_id: None,
            file_id: None,
            instance_id: None,
            replacement_path: None,
        };

        for stored in &events[1..] {
            let Some(kind) = stored.event.corruption_kind() else {
                continue;
            };
            status.state = kind;
            status.last_updated_ms = stored.created_at_ms;
            if kind.is_failure() {
                status.retry_count += 1;
            }
            if let Some(error) = stored.event.error_detail() {
                status.last_error = Some(error.to_string());
            }
            match &stored.event {
                Event::RemediationStarted {
                    item_id,
                    file_id,
                    instance_id,
                    ..
                } => {
                    status.item_id = Some(*item_id);
                    status.file_id = Some(*file_id);
                    status.instance_id = Some(instance_id.clone());
                }
                Event::FileDetected { file_path, .. }
                | Event::VerificationStarted { file_path, .. } => {
                    if *file_path != status.file_path {
                        status.replacement_path = Some(file_path.clone());
                    }
                }
                _ => {}
            }
        }

        Some(status)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Dashboard classification of this aggregate.
    pub fn state_class(&self) -> StateClass {
        match self.state {
            CorruptionEventKind::VerificationSuccess => StateClass::Resolved,
            CorruptionEventKind::MaxRetriesReached => StateClass::Orphaned,
            CorruptionEventKind::ImportBlocked | CorruptionEventKind::ManuallyRemoved => {
                StateClass::ManualIntervention
            }
            CorruptionEventKind::CorruptionIgnored => StateClass::Ignored,
            _ => StateClass::Active,
        }
    }
}

#[cfg(test)]
#[path = "corruption_tests.rs"]
mod tests;
