// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remediation: instruct the owning manager to delete and re-search.
//!
//! One task per aggregate; the retry ceiling is the monitor's job, so a
//! failed step emits its `*Failed` event and stops.

use super::Runtime;
use mendarr_adapters::{ArrClient, ArrError, HealthChecker};
use mendarr_core::{
    ArrInstance, Clock, CorruptionId, Event, Mapped, ScanPathConfig, ScanPathId,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl<H, A, C> Runtime<H, A, C>
where
    H: HealthChecker,
    A: ArrClient,
    C: Clock,
{
    /// React to a fresh detection: resolve policy and start remediation
    /// when the path allows it.
    pub(crate) fn handle_detection(
        self: &Arc<Self>,
        id: &CorruptionId,
        file_path: &Path,
        scan_path_id: &ScanPathId,
    ) {
        let policy = self.lock_state(|state| state.scan_path(scan_path_id.as_str()).cloned());
        let Some(policy) = policy else {
            warn!(corruption_id = %id, scan_path = %scan_path_id, "detection for unknown scan path");
            return;
        };

        if !policy.remediation_allowed(self.config.global_dry_run) {
            // The aggregate stays in corruption:detected for the operator
            info!(
                corruption_id = %id,
                path = %file_path.display(),
                dry_run = policy.dry_run || self.config.global_dry_run,
                auto_remediate = policy.auto_remediate,
                "remediation not permitted for this path, leaving detection in place"
            );
            return;
        }

        self.start_remediation(id.clone(), file_path.to_path_buf(), policy, false);
    }

    /// Spawn the remediation task, deduplicated per aggregate.
    ///
    /// `resume` skips straight to the search step when the manager item is
    /// already known (stalled mid-remediation after a restart); the
    /// destructive delete never runs twice.
    pub(crate) fn start_remediation(
        self: &Arc<Self>,
        id: CorruptionId,
        file_path: PathBuf,
        policy: ScanPathConfig,
        resume: bool,
    ) {
        let mut remediations = self.remediations.lock();
        if remediations.contains_key(id.as_str()) {
            debug!(corruption_id = %id, "remediation already in flight");
            return;
        }

        let runtime = Arc::clone(self);
        let key = id.as_str().to_string();
        let handle = tokio::spawn(async move {
            runtime.run_remediation(&id, &file_path, &policy, resume).await;
            runtime.remediations.lock().remove(id.as_str());
        });
        remediations.insert(key, handle);
    }

    async fn run_remediation(
        self: &Arc<Self>,
        id: &CorruptionId,
        file_path: &Path,
        policy: &ScanPathConfig,
        resume: bool,
    ) {
        let instance = self.lock_state(|state| {
            state
                .arr_instances
                .get(policy.instance_id.as_str())
                .filter(|instance| instance.enabled)
                .cloned()
        });
        let Some(instance) = instance else {
            self.emit(Event::RemediationFailed {
                id: id.clone(),
                error: format!("manager instance '{}' not configured", policy.instance_id),
            })
            .await;
            return;
        };

        // A restart can leave the aggregate parked mid-remediation with
        // the item already resolved; resume from the search step.
        let known_item = self
            .lock_state(|state| state.corruption_status(id.as_str()))
            .and_then(|status| Some((status.item_id?, status.file_id?)));

        let (item_id, file_id) = match known_item {
            Some(known) if resume => known,
            _ => {
                match self.resolve_item(id, file_path, &instance).await {
                    Some(item) => item,
                    None => return,
                }
            }
        };

        if !resume {
            self.emit(Event::DeletionStarted { id: id.clone() }).await;
            match self.arr.delete_file(&instance, file_id).await {
                // The file already being gone is completion, not failure
                Ok(()) | Err(ArrError::NotFound) => {
                    self.emit(Event::DeletionCompleted { id: id.clone() }).await;
                }
                Err(e) => {
                    warn!(corruption_id = %id, error = %e, "deletion failed");
                    self.emit(Event::DeletionFailed {
                        id: id.clone(),
                        error: e.to_string(),
                    })
                    .await;
                    return;
                }
            }
        }

        self.emit(Event::SearchStarted { id: id.clone() }).await;
        match self.arr.search_item(&instance, item_id).await {
            Ok(()) => {
                info!(corruption_id = %id, item_id, "replacement search triggered");
                self.emit(Event::SearchCompleted { id: id.clone() }).await;
            }
            Err(e) => {
                warn!(corruption_id = %id, error = %e, "search failed");
                self.emit(Event::SearchFailed {
                    id: id.clone(),
                    error: e.to_string(),
                })
                .await;
            }
        }
    }

    /// Look up the owning item and record the remediation start.
    ///
    /// Returns `None` after emitting the applicable event when the item
    /// cannot be resolved.
    async fn resolve_item(
        self: &Arc<Self>,
        id: &CorruptionId,
        file_path: &Path,
        instance: &ArrInstance,
    ) -> Option<(u64, u64)> {
        let mapper = self.lock_state(|state| state.path_mapper());
        let remote = match mapper.to_remote(file_path, &instance.id) {
            Mapped::Mapped(path) => path,
            Mapped::Unmapped(path) => {
                // Proceed with the verbatim path: identical namespaces are
                // the common single-host setup
                debug!(
                    corruption_id = %id,
                    path = %path.display(),
                    "no path mapping for instance, using local path as-is"
                );
                path
            }
        };

        match self.arr.lookup_item_by_path(instance, &remote).await {
            Ok(item) => {
                self.emit(Event::RemediationStarted {
                    id: id.clone(),
                    item_id: item.item_id,
                    file_id: item.file_id,
                    instance_id: instance.id.clone(),
                })
                .await;
                Some((item.item_id, item.file_id))
            }
            Err(ArrError::NotFound) => {
                // The manager does not know this file; nothing to re-acquire
                info!(corruption_id = %id, path = %remote.display(), "item not found in manager");
                self.emit(Event::ImportBlocked {
                    id: id.clone(),
                    reason: "item not found in manager library".to_string(),
                })
                .await;
                None
            }
            Err(e) => {
                warn!(corruption_id = %id, error = %e, "item lookup failed");
                self.emit(Event::RemediationFailed {
                    id: id.clone(),
                    error: e.to_string(),
                })
                .await;
                None
            }
        }
    }
}
