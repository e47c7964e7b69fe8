// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verification: wait for a healthy replacement after a search.
//!
//! One waiter per aggregate, cancellable when the aggregate reaches a
//! terminal state. Stages, each ending the wait when determinative:
//! download observation → import observation → direct lookup →
//! filesystem wait → health check.

use super::{Runtime, TaskControl};
use mendarr_adapters::{ArrClient, HealthChecker, HistoryEventKind};
use mendarr_core::{
    Clock, CorruptionId, CorruptionStatus, Event, HealthVerdict, Mapped, ScanPathConfig,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How the wait ended (for logging; events carry the detail).
enum VerifyEnd {
    Determined,
    Cancelled,
    TimedOut,
}

impl<H, A, C> Runtime<H, A, C>
where
    H: HealthChecker,
    A: ArrClient,
    C: Clock,
{
    /// Start (or keep) the verification waiter for an aggregate.
    pub(crate) fn arm_verifier(self: &Arc<Self>, id: &CorruptionId) {
        if self.is_shutting_down() {
            return;
        }
        let mut waiters = self.verify_tasks.lock();
        if let Some(control) = waiters.get(id.as_str()) {
            if !control.handle.is_finished() {
                debug!(corruption_id = %id, "verification already waiting");
                return;
            }
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let runtime = Arc::clone(self);
        let task_id = id.clone();
        let flag = Arc::clone(&cancel);
        let handle = tokio::spawn(async move {
            runtime.run_verification(&task_id, flag).await;
            runtime.verify_tasks.lock().remove(task_id.as_str());
        });
        waiters.insert(id.as_str().to_string(), TaskControl { cancel, handle });
    }

    /// Whether a verification waiter is live for this aggregate.
    pub fn has_verify_waiter(&self, id: &str) -> bool {
        self.verify_tasks
            .lock()
            .get(id)
            .map(|control| !control.handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancel the waiter silently (aggregate reached a terminal state).
    pub(crate) fn cancel_verifier(&self, id: &CorruptionId) {
        if let Some(control) = self.verify_tasks.lock().remove(id.as_str()) {
            control.cancel.store(true, Ordering::SeqCst);
            control.handle.abort();
            debug!(corruption_id = %id, "verification waiter cancelled");
        }
    }

    async fn run_verification(self: &Arc<Self>, id: &CorruptionId, cancel: Arc<AtomicBool>) {
        let setup = self.lock_state(|state| {
            let status = state.corruption_status(id.as_str())?;
            let policy = state.scan_path(status.scan_path_id.as_str()).cloned();
            let instance = status
                .instance_id
                .as_ref()
                .and_then(|iid| state.arr_instances.get(iid.as_str()).cloned());
            Some((status, policy, instance))
        });
        let Some((status, policy, instance)) = setup else {
            warn!(corruption_id = %id, "verification armed for unknown aggregate");
            return;
        };

        let timeout = policy
            .as_ref()
            .map(ScanPathConfig::verification_timeout)
            .unwrap_or(self.config.default_verification_timeout);
        let interval = policy
            .as_ref()
            .map(ScanPathConfig::verification_interval)
            .unwrap_or(self.config.default_verification_interval);
        let deadline = self.clock.now() + timeout;

        let end = self
            .verification_stages(id, &status, instance, interval, deadline, &cancel)
            .await;

        match end {
            VerifyEnd::Determined => {}
            VerifyEnd::Cancelled => {
                debug!(corruption_id = %id, "verification abandoned");
            }
            VerifyEnd::TimedOut => {
                self.emit(Event::VerificationFailed {
                    id: id.clone(),
                    error: "timeout".to_string(),
                })
                .await;
            }
        }
    }

    async fn verification_stages(
        self: &Arc<Self>,
        id: &CorruptionId,
        status: &CorruptionStatus,
        instance: Option<mendarr_core::ArrInstance>,
        interval: Duration,
        deadline: Instant,
        cancel: &AtomicBool,
    ) -> VerifyEnd {
        let mut target = status.file_path.clone();

        if let (Some(instance), Some(item_id)) = (instance.as_ref(), status.item_id) {
            // Stage 1: watch the download queue while the item is in it
            match self
                .observe_download(id, instance, item_id, interval, deadline, cancel)
                .await
            {
                Ok(()) => {}
                Err(end) => return end,
            }

            // Stage 2: look for an import in history since the search
            match self
                .observe_history(id, instance, item_id, status.last_updated_ms)
                .await
            {
                Ok(Some(imported)) => target = imported,
                Ok(None) => {
                    // Stage 3: ask for the item's current file directly
                    if let Ok(Some(path)) = self.arr.item_file(instance, item_id).await {
                        let mapper = self.lock_state(|state| state.path_mapper());
                        let local = match mapper.to_local(&path, &instance.id) {
                            Mapped::Mapped(p) | Mapped::Unmapped(p) => p,
                        };
                        if local != status.file_path {
                            target = local;
                        }
                    }
                }
                Err(end) => return end,
            }
        }

        // Stage 4: wait for the chosen path to exist on disk
        self.emit(Event::VerificationStarted {
            id: id.clone(),
            file_path: target.clone(),
        })
        .await;

        let mut waited = false;
        loop {
            if cancel.load(Ordering::SeqCst) {
                return VerifyEnd::Cancelled;
            }
            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                break;
            }
            waited = true;
            if self.clock.now() + interval > deadline {
                return VerifyEnd::TimedOut;
            }
            tokio::time::sleep(interval).await;
        }
        if waited {
            self.emit(Event::FileDetected {
                id: id.clone(),
                file_path: target.clone(),
            })
            .await;
        }

        // Stage 5: the replacement must itself be healthy
        let method = self
            .lock_state(|state| {
                state
                    .scan_path(status.scan_path_id.as_str())
                    .map(|p| p.detection_method)
            })
            .unwrap_or_default();
        match self.health.check(&target, method).await {
            HealthVerdict::Healthy => {
                info!(corruption_id = %id, path = %target.display(), "replacement verified healthy");
                self.emit(Event::VerificationSuccess { id: id.clone() }).await;
            }
            HealthVerdict::Corrupt { kind, detail } => {
                warn!(corruption_id = %id, %kind, "replacement is corrupt");
                self.emit(Event::VerificationFailed {
                    id: id.clone(),
                    error: format!("replacement corrupt ({kind}): {detail}"),
                })
                .await;
            }
            HealthVerdict::Inaccessible { reason } => {
                self.emit(Event::VerificationFailed {
                    id: id.clone(),
                    error: format!("replacement inaccessible: {reason}"),
                })
                .await;
            }
        }
        VerifyEnd::Determined
    }

    /// Stage 1: while the item sits in the download queue, report it.
    async fn observe_download(
        self: &Arc<Self>,
        id: &CorruptionId,
        instance: &mendarr_core::ArrInstance,
        item_id: u64,
        interval: Duration,
        deadline: Instant,
        cancel: &AtomicBool,
    ) -> Result<(), VerifyEnd> {
        let mut queued_reported = false;
        let mut last_progress_at: Option<Instant> = None;
        let mut last_percent: Option<u8> = None;

        loop {
            if cancel.load(Ordering::SeqCst) {
                return Err(VerifyEnd::Cancelled);
            }

            let entry = match self.arr.queue(instance).await {
                Ok(queue) => queue.into_iter().find(|entry| entry.item_id == item_id),
                Err(e) => {
                    // Transient manager trouble is not determinative;
                    // keep polling until the deadline says otherwise
                    debug!(corruption_id = %id, error = %e, "queue poll failed");
                    None
                }
            };

            let Some(entry) = entry else {
                return Ok(());
            };

            if !queued_reported {
                queued_reported = true;
                self.emit(Event::DownloadQueued { id: id.clone() }).await;
            }

            let throttle_ok = last_progress_at
                .map(|at| {
                    self.clock.now().saturating_duration_since(at)
                        >= self.config.download_progress_every
                })
                .unwrap_or(true);
            if throttle_ok && entry.percent != last_percent {
                last_percent = entry.percent;
                last_progress_at = Some(self.clock.now());
                self.emit(Event::DownloadProgress {
                    id: id.clone(),
                    percent: entry.percent,
                })
                .await;
            }

            if self.clock.now() + interval > deadline {
                return Err(VerifyEnd::TimedOut);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Stage 2: a determinative import (or import failure) in history.
    async fn observe_history(
        self: &Arc<Self>,
        id: &CorruptionId,
        instance: &mendarr_core::ArrInstance,
        item_id: u64,
        since_ms: u64,
    ) -> Result<Option<PathBuf>, VerifyEnd> {
        let history = match self.arr.history_since(instance, since_ms).await {
            Ok(history) => history,
            Err(e) => {
                debug!(corruption_id = %id, error = %e, "history poll failed");
                return Ok(None);
            }
        };

        let mut grabbed = false;
        for entry in history.iter().filter(|entry| entry.item_id == item_id) {
            match entry.kind {
                HistoryEventKind::Imported => {
                    if let Some(path) = &entry.imported_path {
                        let mapper = self.lock_state(|state| state.path_mapper());
                        let local = match mapper.to_local(path, &instance.id) {
                            Mapped::Mapped(p) | Mapped::Unmapped(p) => p,
                        };
                        info!(corruption_id = %id, path = %local.display(), "import observed in history");
                        return Ok(Some(local));
                    }
                }
                HistoryEventKind::ImportFailed => {
                    self.emit(Event::ImportBlocked {
                        id: id.clone(),
                        reason: "manager reported a failed or blocked import".to_string(),
                    })
                    .await;
                    return Err(VerifyEnd::Determined);
                }
                HistoryEventKind::Grabbed => grabbed = true,
                _ => {}
            }
        }

        // Grabbed with the download gone from the queue: the manager is
        // importing. Record it once; the filesystem wait takes over.
        if grabbed {
            let already = self.lock_state(|state| {
                state.corruption_state(id.as_str())
                    == Some(mendarr_core::CorruptionEventKind::ImportStarted)
            });
            if !already {
                self.emit(Event::ImportStarted { id: id.clone() }).await;
            }
        }
        Ok(None)
    }
}
