// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan orchestration: traversal, the bounded checker pool, progress
//! coalescing, cancellation and pause/resume.

use super::{Runtime, TaskControl};
use mendarr_adapters::{ArrClient, HealthChecker};
use mendarr_core::{
    rescan_backoff, Clock, CorruptionId, Event, HealthVerdict, ScanFileStatus, ScanId,
    ScanPathConfig, UuidIdGen, IdGen,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// One file's metadata as seen during traversal.
#[derive(Debug, Clone)]
struct FileMeta {
    path: PathBuf,
    size: u64,
    modified_ms: u64,
}

/// Result of checking one file.
struct CheckOutcome {
    meta: FileMeta,
    verdict: HealthVerdict,
}

/// Why a scan worker stopped before finishing the file list.
enum StopReason {
    Cancelled,
    Paused,
}

impl<H, A, C> Runtime<H, A, C>
where
    H: HealthChecker,
    A: ArrClient,
    C: Clock,
{
    /// Turn a scan request into a queued scan record.
    ///
    /// Refused when the path is unknown or disabled, or when it already
    /// has a live scan.
    pub(crate) fn handle_scan_requested(
        &self,
        scan_path_id: &mendarr_core::ScanPathId,
        root_override: Option<PathBuf>,
    ) -> Vec<Event> {
        let lookup = self.lock_state(|state| {
            let config = state.scan_path(scan_path_id.as_str()).cloned();
            let live = state.scans.values().any(|scan| {
                scan.scan_path_id == *scan_path_id && !scan.status.is_terminal()
            });
            (config, live)
        });

        let Some(config) = lookup.0 else {
            warn!(scan_path = %scan_path_id, "scan requested for unknown path");
            return Vec::new();
        };
        if !config.enabled {
            debug!(scan_path = %scan_path_id, "scan requested for disabled path");
            return Vec::new();
        }
        if lookup.1 {
            debug!(scan_path = %scan_path_id, "scan already live for path, not queueing another");
            return Vec::new();
        }

        let scan_id = {
            let mut floor = self.scan_id_floor.lock();
            let next = self.lock_state(|state| state.peek_next_scan_id()).max(*floor + 1);
            *floor = next;
            ScanId(next)
        };

        vec![Event::ScanQueued {
            scan_id,
            scan_path_id: scan_path_id.clone(),
            root: root_override.unwrap_or(config.local_root),
        }]
    }

    /// Spawn the worker task for a queued or resumable scan.
    pub(crate) fn spawn_scan(self: &Arc<Self>, scan_id: ScanId, resumed: bool) {
        if self.is_shutting_down() {
            return;
        }
        let mut tasks = self.scan_tasks.lock();
        if tasks.contains_key(&scan_id.0) {
            return;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let runtime = Arc::clone(self);
        let flag = Arc::clone(&cancel);
        let handle = tokio::spawn(async move {
            runtime.run_scan(scan_id, resumed, flag).await;
        });
        tasks.insert(scan_id.0, TaskControl { cancel, handle });
    }

    /// Flag a live scan's worker to stop. The worker emits
    /// `scan:cancelled` once it has drained.
    pub(crate) fn signal_scan_cancel(&self, scan_id: ScanId) {
        if let Some(control) = self.scan_tasks.lock().get(&scan_id.0) {
            control.cancel.store(true, Ordering::SeqCst);
        } else {
            // No live worker (queued scan or daemon restarted mid-cancel):
            // finalize directly
            let runtime_tx = self.event_tx.clone();
            tokio::spawn(async move {
                let _ = runtime_tx.send(Event::ScanCancelled { scan_id }).await;
            });
        }
    }

    async fn run_scan(self: Arc<Self>, scan_id: ScanId, resumed: bool, cancel: Arc<AtomicBool>) {
        if let Err(error) = self.run_scan_inner(scan_id, resumed, &cancel).await {
            warn!(%scan_id, error = %error, "scan failed");
            self.emit(Event::ScanFailed { scan_id, error }).await;
        }
        self.scan_tasks.lock().remove(&scan_id.0);
    }

    async fn run_scan_inner(
        self: &Arc<Self>,
        scan_id: ScanId,
        resumed: bool,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(), String> {
        struct ScanPlan {
            root: PathBuf,
            policy: ScanPathConfig,
            existing: HashMap<PathBuf, (ScanFileStatus, u64, u64)>,
            files_seen: u64,
            files_scanned: u64,
            corruptions_found: u64,
            cancelling: bool,
        }

        let plan = self.lock_state(|state| {
            let scan = state.scans.get(&scan_id.0)?;
            let policy = state.scan_path(scan.scan_path_id.as_str())?.clone();
            let existing = state
                .scan_files
                .get(&scan_id.0)
                .map(|rows| {
                    rows.values()
                        .map(|row| (row.path.clone(), (row.status, row.size, row.modified_ms)))
                        .collect()
                })
                .unwrap_or_default();
            Some(ScanPlan {
                root: scan.root.clone(),
                policy,
                existing,
                files_seen: scan.files_seen,
                files_scanned: scan.files_scanned,
                corruptions_found: scan.corruptions_found,
                cancelling: scan.cancelling,
            })
        });
        let Some(mut plan) = plan else {
            return Err("scan or its path configuration is gone".to_string());
        };

        if plan.cancelling {
            self.emit(Event::ScanCancelled { scan_id }).await;
            return Ok(());
        }

        self.emit(Event::ScanStarted { scan_id, resumed }).await;
        info!(%scan_id, root = %plan.root.display(), resumed, "scan running");

        // Traverse on a blocking thread; the listing can be large
        let root = plan.root.clone();
        let mut files = tokio::task::spawn_blocking(move || walk_files(&root))
            .await
            .map_err(|e| format!("traversal task failed: {e}"))?
            .map_err(|e| format!("cannot walk root: {e}"))?;
        files.sort_by(|a, b| a.path.cmp(&b.path));

        // A healthy file recorded with unchanged size+mtime is not
        // re-checked within the same scan
        let existing = std::mem::take(&mut plan.existing);
        let mut pending: Vec<FileMeta> = files
            .into_iter()
            .filter(|meta| {
                match existing.get(&meta.path) {
                    Some((ScanFileStatus::Healthy, size, modified)) => {
                        !(meta.size == *size && meta.modified_ms == *modified)
                    }
                    _ => true,
                }
            })
            .collect();
        pending.reverse(); // pop() from the front of the sorted order

        let mut join_set: JoinSet<CheckOutcome> = JoinSet::new();
        let mut last_progress = self.clock.now();
        let mut files_since_progress = 0u64;
        let mut stop: Option<StopReason> = None;

        loop {
            if stop.is_none() {
                if cancel.load(Ordering::SeqCst) {
                    stop = Some(StopReason::Cancelled);
                } else if self.is_shutting_down() {
                    stop = Some(StopReason::Paused);
                }
            }

            // Keep the window full while we're still going
            while stop.is_none()
                && join_set.len() < self.config.scanner_concurrency.max(1)
                && !pending.is_empty()
            {
                if let Some(meta) = pending.pop() {
                    let permits = Arc::clone(&self.scanner_permits);
                    let health = self.health.clone();
                    let method = plan.policy.detection_method;
                    join_set.spawn(async move {
                        // Permit bounds checks across concurrent scans
                        let _permit = permits.acquire_owned().await;
                        let verdict = health.check(&meta.path, method).await;
                        CheckOutcome { meta, verdict }
                    });
                }
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(%scan_id, error = %e, "file check task failed");
                    continue;
                }
            };

            // Once stopping, drain without recording: a resumed or fresh
            // pass will re-check these files
            if stop.is_some() {
                continue;
            }

            self.record_outcome(
                scan_id,
                &plan.policy,
                &existing,
                &outcome,
                &mut plan.files_seen,
                &mut plan.files_scanned,
                &mut plan.corruptions_found,
            )
            .await;

            files_since_progress += 1;
            let elapsed = self.clock.now().saturating_duration_since(last_progress);
            if files_since_progress >= self.config.progress_every_files
                || elapsed >= self.config.progress_every
            {
                self.emit(Event::ScanProgress {
                    scan_id,
                    files_seen: plan.files_seen,
                    files_scanned: plan.files_scanned,
                    corruptions_found: plan.corruptions_found,
                })
                .await;
                files_since_progress = 0;
                last_progress = self.clock.now();
            }
        }

        match stop {
            Some(StopReason::Cancelled) => {
                info!(%scan_id, "scan cancelled");
                self.emit(Event::ScanCancelled { scan_id }).await;
            }
            Some(StopReason::Paused) => {
                info!(%scan_id, "scan paused for shutdown");
                self.emit(Event::ScanPaused { scan_id }).await;
            }
            None => {
                self.emit(Event::ScanProgress {
                    scan_id,
                    files_seen: plan.files_seen,
                    files_scanned: plan.files_scanned,
                    corruptions_found: plan.corruptions_found,
                })
                .await;
                self.emit(Event::ScanCompleted {
                    scan_id,
                    files_scanned: plan.files_scanned,
                    corruptions_found: plan.corruptions_found,
                })
                .await;
                info!(
                    %scan_id,
                    files_scanned = plan.files_scanned,
                    corruptions_found = plan.corruptions_found,
                    "scan completed"
                );
            }
        }

        Ok(())
    }

    /// Record one check result: file row, detection or rescan entry, and
    /// the local counter mirror of the state's guarded increments.
    #[allow(clippy::too_many_arguments)]
    async fn record_outcome(
        self: &Arc<Self>,
        scan_id: ScanId,
        policy: &ScanPathConfig,
        existing: &HashMap<PathBuf, (ScanFileStatus, u64, u64)>,
        outcome: &CheckOutcome,
        files_seen: &mut u64,
        files_scanned: &mut u64,
        corruptions_found: &mut u64,
    ) {
        let previous = existing.get(&outcome.meta.path).map(|(status, _, _)| *status);
        let status = match &outcome.verdict {
            HealthVerdict::Healthy => ScanFileStatus::Healthy,
            HealthVerdict::Corrupt { .. } => ScanFileStatus::Corrupt,
            HealthVerdict::Inaccessible { .. } => ScanFileStatus::Inaccessible,
        };

        if previous.is_none() {
            *files_seen += 1;
        }
        if status != ScanFileStatus::Inaccessible
            && !matches!(
                previous,
                Some(ScanFileStatus::Healthy) | Some(ScanFileStatus::Corrupt)
            )
        {
            *files_scanned += 1;
        }
        if status == ScanFileStatus::Corrupt && previous != Some(ScanFileStatus::Corrupt) {
            *corruptions_found += 1;
        }

        self.emit(Event::ScanFileRecorded {
            scan_id,
            file_path: outcome.meta.path.clone(),
            status,
            size: outcome.meta.size,
            modified_ms: outcome.meta.modified_ms,
        })
        .await;

        match &outcome.verdict {
            HealthVerdict::Healthy => {}
            HealthVerdict::Corrupt { kind, detail } => {
                if self.has_active_corruption_for(&outcome.meta.path) {
                    debug!(
                        path = %outcome.meta.path.display(),
                        "corruption already tracked, not detecting again"
                    );
                    return;
                }
                let id = CorruptionId::new(UuidIdGen.next());
                info!(
                    corruption_id = %id,
                    path = %outcome.meta.path.display(),
                    kind = %kind,
                    "corruption detected"
                );
                self.emit(Event::CorruptionDetected {
                    id,
                    file_path: outcome.meta.path.clone(),
                    scan_path_id: policy.id.clone(),
                    corruption_type: *kind,
                    detail: detail.clone(),
                })
                .await;
            }
            HealthVerdict::Inaccessible { reason } => {
                // Never a detection: remediating an unreachable file
                // deletes a file that may be fine once the mount returns
                warn!(
                    path = %outcome.meta.path.display(),
                    reason,
                    "file inaccessible, queueing rescan"
                );
                self.emit(Event::RescanQueued {
                    file_path: outcome.meta.path.clone(),
                    scan_path_id: policy.id.clone(),
                    reason: reason.clone(),
                    attempts: 0,
                    next_retry_at_ms: self.clock.epoch_ms()
                        + rescan_backoff(0).as_millis() as u64,
                })
                .await;
            }
        }
    }
}

/// Collect every regular file under `root`.
///
/// Unreadable subdirectories are skipped with a warning; an unreadable
/// root fails the scan.
fn walk_files(root: &Path) -> Result<Vec<FileMeta>, std::io::Error> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    let mut first = true;

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if first => return Err(e),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        first = false;

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() {
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                let modified_ms = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as u64)
                    .unwrap_or(0);
                files.push(FileMeta {
                    path,
                    size: metadata.len(),
                    modified_ms,
                });
            }
        }
    }

    Ok(files)
}
