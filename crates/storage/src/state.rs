// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay.
//!
//! Corruption aggregates are kept as ordered event lists so the aggregate
//! history survives WAL truncation; every other table is a fold of the
//! events that touched it. The derived views (`corruption_status`,
//! `dashboard_stats`) are recomputable from events alone.

use mendarr_core::{
    ArrInstance, CorruptionEventKind, CorruptionStatus, Event, PathMapper, PathMapping,
    PendingRescan, Scan, ScanFile, ScanFileStatus, ScanPathConfig, ScanStatus, ScheduleConfig,
    StateClass, StoredEvent,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::warn;

/// Canonical string key for path-indexed tables.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// A schedule record with its durable fire history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub config: ScheduleConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fired_at_ms: Option<u64>,
}

/// Dashboard counts partitioned by coarse-grained state class.
///
/// `in_progress` is a subset of `active`; ignored aggregates appear in no
/// count at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_corruptions: u64,
    pub active_corruptions: u64,
    pub resolved_corruptions: u64,
    pub orphaned_corruptions: u64,
    pub in_progress: u64,
    pub manual_intervention_required: u64,
}

/// What a retention pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub corruptions_removed: usize,
    pub scans_removed: usize,
    pub scan_file_rows_removed: usize,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.corruptions_removed == 0 && self.scans_removed == 0 && self.scan_file_rows_removed == 0
    }
}

/// Materialized state built from WAL replay
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    /// Corruption aggregates: id → ordered event history
    pub corruptions: HashMap<String, Vec<StoredEvent>>,
    pub scans: BTreeMap<u64, Scan>,
    /// Per-scan file table: scan id → path key → record
    #[serde(default)]
    pub scan_files: HashMap<u64, HashMap<String, ScanFile>>,
    #[serde(default)]
    pub scan_paths: HashMap<String, ScanPathConfig>,
    #[serde(default)]
    pub pending_rescans: HashMap<String, PendingRescan>,
    #[serde(default)]
    pub arr_instances: HashMap<String, ArrInstance>,
    #[serde(default)]
    pub schedules: HashMap<String, ScheduleRecord>,
    #[serde(default)]
    pub settings: HashMap<String, String>,
    /// Next scan id to assign (monotonic, replay-stable)
    #[serde(default)]
    pub next_scan_id: u64,
}

impl MaterializedState {
    /// Ordered event history of one corruption aggregate.
    pub fn read_aggregate(&self, id: &str) -> &[StoredEvent] {
        self.corruptions.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Current status view of one corruption aggregate.
    pub fn corruption_status(&self, id: &str) -> Option<CorruptionStatus> {
        CorruptionStatus::fold(self.read_aggregate(id))
    }

    /// Status views of every aggregate, detection order not guaranteed.
    pub fn corruption_statuses(&self) -> Vec<CorruptionStatus> {
        self.corruptions
            .values()
            .filter_map(|events| CorruptionStatus::fold(events))
            .collect()
    }

    /// Latest state-machine kind of an aggregate, if it exists.
    pub fn corruption_state(&self, id: &str) -> Option<CorruptionEventKind> {
        self.corruptions
            .get(id)?
            .last()
            .and_then(|stored| stored.event.corruption_kind())
    }

    /// Whether an aggregate has reached a terminal state.
    pub fn corruption_is_terminal(&self, id: &str) -> bool {
        self.corruption_state(id)
            .map(CorruptionEventKind::is_terminal)
            .unwrap_or(false)
    }

    /// Dashboard counts over all corruption aggregates.
    pub fn dashboard_stats(&self) -> DashboardStats {
        let mut stats = DashboardStats::default();
        for status in self.corruption_statuses() {
            match status.state_class() {
                StateClass::Ignored => continue,
                StateClass::Resolved => stats.resolved_corruptions += 1,
                StateClass::Orphaned => stats.orphaned_corruptions += 1,
                StateClass::ManualIntervention => stats.manual_intervention_required += 1,
                StateClass::Active => {
                    stats.active_corruptions += 1;
                    if status.state.is_in_progress() {
                        stats.in_progress += 1;
                    }
                }
            }
            stats.total_corruptions += 1;
        }
        stats
    }

    /// The next scan id to assign for a fresh scan record.
    pub fn peek_next_scan_id(&self) -> u64 {
        self.next_scan_id.max(1)
    }

    /// Scan path config by id.
    pub fn scan_path(&self, id: &str) -> Option<&ScanPathConfig> {
        self.scan_paths.get(id)
    }

    /// Path mapper derived from the configured scan paths.
    pub fn path_mapper(&self) -> PathMapper {
        let mappings = self
            .scan_paths
            .values()
            .map(|config| PathMapping {
                instance_id: config.instance_id.clone(),
                local_prefix: config.local_root.clone(),
                remote_prefix: config.remote_root.clone(),
            })
            .collect();
        PathMapper::new(mappings)
    }

    /// Remove data older than the cutoff: corruption aggregates whose latest
    /// event predates it, terminal scans that finished before it, and
    /// scan-file tables whose scan no longer exists.
    pub fn prune(&mut self, cutoff_ms: u64) -> PruneReport {
        let mut report = PruneReport::default();

        let before = self.corruptions.len();
        self.corruptions.retain(|_, events| {
            events
                .last()
                .map(|stored| stored.created_at_ms >= cutoff_ms)
                .unwrap_or(false)
        });
        report.corruptions_removed = before - self.corruptions.len();

        let stale: Vec<u64> = self
            .scans
            .values()
            .filter(|scan| {
                scan.status.is_terminal()
                    && scan.completed_at_ms.unwrap_or(scan.queued_at_ms) < cutoff_ms
            })
            .map(|scan| scan.id.0)
            .collect();
        for id in &stale {
            self.scans.remove(id);
        }
        report.scans_removed = stale.len();

        let orphaned: Vec<u64> = self
            .scan_files
            .keys()
            .filter(|id| !self.scans.contains_key(id))
            .copied()
            .collect();
        for id in orphaned {
            if let Some(rows) = self.scan_files.remove(&id) {
                report.scan_file_rows_removed += rows.len();
            }
        }

        report
    }

    /// Apply an event to derive state changes.
    ///
    /// This is the event-sourcing approach where state is derived from
    /// events. Events are facts about what happened; state is derived from
    /// those facts.
    ///
    /// # Idempotency Requirement
    ///
    /// **All event handlers MUST be idempotent.** Applying the same event
    /// twice must produce the same state as applying it once, because an
    /// entry can be re-applied after a crash between apply and
    /// mark_processed.
    ///
    /// Guidelines:
    /// - Use assignment (`=`) instead of mutation (`+=`, `-=`)
    /// - Guard inserts with existence checks
    /// - Guard increments with status checks (only increment on transition)
    pub fn apply(&mut self, seq: u64, created_at_ms: u64, event: &Event) {
        if event.corruption_kind().is_some() {
            self.apply_corruption(seq, created_at_ms, event);
            return;
        }

        match event {
            Event::ScanQueued {
                scan_id,
                scan_path_id,
                root,
            } => {
                self.scans.entry(scan_id.0).or_insert_with(|| {
                    Scan::new(*scan_id, scan_path_id.clone(), root.clone(), created_at_ms)
                });
                self.next_scan_id = self.next_scan_id.max(scan_id.0 + 1);
            }

            Event::ScanStarted { scan_id, .. } => {
                if let Some(scan) = self.scans.get_mut(&scan_id.0) {
                    if !scan.status.is_terminal() {
                        scan.status = ScanStatus::Running;
                        scan.started_at_ms.get_or_insert(created_at_ms);
                    }
                }
            }

            Event::ScanProgress {
                scan_id,
                files_seen,
                files_scanned,
                corruptions_found,
            } => {
                if let Some(scan) = self.scans.get_mut(&scan_id.0) {
                    // Counters never decrease during a scan's lifetime
                    scan.files_seen = scan.files_seen.max(*files_seen);
                    scan.files_scanned = scan.files_scanned.max(*files_scanned);
                    scan.corruptions_found = scan.corruptions_found.max(*corruptions_found);
                }
            }

            Event::ScanFileRecorded {
                scan_id,
                file_path,
                status,
                size,
                modified_ms,
            } => {
                let key = path_key(file_path);
                let rows = self.scan_files.entry(scan_id.0).or_default();
                let previous = rows.insert(
                    key,
                    ScanFile {
                        path: file_path.clone(),
                        status: *status,
                        size: *size,
                        modified_ms: *modified_ms,
                        checked_at_ms: created_at_ms,
                    },
                );

                if let Some(scan) = self.scans.get_mut(&scan_id.0) {
                    let was = previous.map(|p| p.status);
                    if was.is_none() {
                        scan.files_seen += 1;
                    }
                    let newly_scanned = *status != ScanFileStatus::Inaccessible
                        && !matches!(
                            was,
                            Some(ScanFileStatus::Healthy) | Some(ScanFileStatus::Corrupt)
                        );
                    if newly_scanned {
                        scan.files_scanned += 1;
                    }
                    if *status == ScanFileStatus::Corrupt && was != Some(ScanFileStatus::Corrupt) {
                        scan.corruptions_found += 1;
                    }
                }
            }

            Event::ScanCompleted {
                scan_id,
                files_scanned,
                corruptions_found,
            } => {
                if let Some(scan) = self.scans.get_mut(&scan_id.0) {
                    if !scan.status.is_terminal() {
                        scan.status = ScanStatus::Completed;
                        scan.completed_at_ms = Some(created_at_ms);
                        scan.cancelling = false;
                    }
                    scan.files_scanned = scan.files_scanned.max(*files_scanned);
                    scan.corruptions_found = scan.corruptions_found.max(*corruptions_found);
                }
            }

            Event::ScanCancelRequested { scan_id } => {
                if let Some(scan) = self.scans.get_mut(&scan_id.0) {
                    if !scan.status.is_terminal() {
                        scan.cancelling = true;
                    }
                }
            }

            Event::ScanCancelled { scan_id } => {
                if let Some(scan) = self.scans.get_mut(&scan_id.0) {
                    if !scan.status.is_terminal() {
                        scan.status = ScanStatus::Cancelled;
                        scan.completed_at_ms = Some(created_at_ms);
                        scan.cancelling = false;
                    }
                }
            }

            Event::ScanPaused { scan_id } => {
                if let Some(scan) = self.scans.get_mut(&scan_id.0) {
                    if scan.status == ScanStatus::Running || scan.status == ScanStatus::Queued {
                        scan.status = ScanStatus::Paused;
                    }
                }
            }

            Event::ScanFailed { scan_id, error } => {
                if let Some(scan) = self.scans.get_mut(&scan_id.0) {
                    if !scan.status.is_terminal() {
                        scan.status = ScanStatus::Error;
                        scan.error = Some(error.clone());
                        scan.completed_at_ms = Some(created_at_ms);
                        scan.cancelling = false;
                    }
                }
            }

            Event::RescanQueued {
                file_path,
                scan_path_id,
                reason,
                attempts,
                next_retry_at_ms,
            } => {
                self.pending_rescans.insert(
                    path_key(file_path),
                    PendingRescan {
                        file_path: file_path.clone(),
                        scan_path_id: scan_path_id.clone(),
                        reason: reason.clone(),
                        attempts: *attempts,
                        next_retry_at_ms: *next_retry_at_ms,
                    },
                );
            }

            Event::RescanResolved { file_path } => {
                self.pending_rescans.remove(&path_key(file_path));
            }

            Event::ScanPathConfigured { config } => {
                self.scan_paths
                    .insert(config.id.as_str().to_string(), config.clone());
            }

            Event::ScanPathRemoved { id } => {
                self.scan_paths.remove(id.as_str());
            }

            Event::ArrInstanceConfigured { instance } => {
                self.arr_instances
                    .insert(instance.id.as_str().to_string(), instance.clone());
            }

            Event::ScheduleAdded { schedule } => {
                // Preserve last_fired_at_ms across re-configuration
                let last_fired_at_ms = self
                    .schedules
                    .get(schedule.id.as_str())
                    .and_then(|r| r.last_fired_at_ms);
                self.schedules.insert(
                    schedule.id.as_str().to_string(),
                    ScheduleRecord {
                        config: schedule.clone(),
                        last_fired_at_ms,
                    },
                );
            }

            Event::ScheduleRemoved { id } => {
                self.schedules.remove(id.as_str());
            }

            Event::ScheduleFired { id, fired_at_ms } => {
                if let Some(record) = self.schedules.get_mut(id.as_str()) {
                    record.last_fired_at_ms = Some(
                        record
                            .last_fired_at_ms
                            .unwrap_or(0)
                            .max(*fired_at_ms),
                    );
                }
            }

            Event::SettingUpdated { key, value } => {
                self.settings.insert(key.clone(), value.clone());
            }

            // Control events that don't affect persisted state
            // (handled by the runtime)
            Event::ScanRequested { .. } | Event::Shutdown => {}

            // Corruption events are handled above
            _ => {}
        }
    }

    /// Apply a corruption-lifecycle event to its aggregate.
    ///
    /// Enforces the aggregate invariants independently of the engine's own
    /// rejection: the first event must be a detection, detection never
    /// repeats, and terminal aggregates accept nothing further.
    fn apply_corruption(&mut self, seq: u64, created_at_ms: u64, event: &Event) {
        let Some(kind) = event.corruption_kind() else {
            return;
        };
        let Some(id) = event.corruption_id() else {
            return;
        };

        let stored = StoredEvent {
            id: seq,
            created_at_ms,
            event: event.clone(),
        };

        match self.corruptions.get_mut(id.as_str()) {
            None => {
                if !kind.may_follow(None) {
                    warn!(
                        corruption_id = %id,
                        kind = %kind,
                        "rejecting event for unknown aggregate (first event must be a detection)",
                    );
                    return;
                }
                self.corruptions
                    .insert(id.as_str().to_string(), vec![stored]);
            }
            Some(events) => {
                // Idempotency: re-applying an already-recorded entry is a
                // no-op
                if events.last().map(|last| last.id >= seq).unwrap_or(false) {
                    return;
                }
                let prev = events.last().and_then(|s| s.event.corruption_kind());
                if !kind.may_follow(prev) {
                    let prev_label =
                        prev.map(|p| p.to_string()).unwrap_or_else(|| "none".into());
                    warn!(
                        corruption_id = %id,
                        kind = %kind,
                        prev = %prev_label,
                        "rejecting event that violates the corruption state machine",
                    );
                    return;
                }
                events.push(stored);
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests/mod.rs"]
mod tests;
