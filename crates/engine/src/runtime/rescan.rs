// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rescan worker: re-check files that were inaccessible, with backoff.

use super::Runtime;
use mendarr_adapters::{ArrClient, HealthChecker};
use mendarr_core::{
    rescan_backoff, Clock, CorruptionId, Event, HealthVerdict, IdGen, PendingRescan, UuidIdGen,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

impl<H, A, C> Runtime<H, A, C>
where
    H: HealthChecker,
    A: ArrClient,
    C: Clock,
{
    /// Drain due pending-rescan entries. Called from the daemon's tick;
    /// the pass runs as a task, and only one pass runs at a time.
    pub fn spawn_rescan_pass(self: &Arc<Self>) {
        if self.is_shutting_down() {
            return;
        }
        if self
            .rescan_pass_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let runtime = Arc::clone(self);
        tokio::spawn(async move {
            runtime.run_rescan_pass().await;
            runtime.rescan_pass_running.store(false, Ordering::SeqCst);
        });
    }

    async fn run_rescan_pass(self: &Arc<Self>) {
        let now_ms = self.clock.epoch_ms();
        let due: Vec<PendingRescan> = self.lock_state(|state| {
            state
                .pending_rescans
                .values()
                .filter(|entry| entry.is_due(now_ms))
                .cloned()
                .collect()
        });

        for entry in due {
            if self.is_shutting_down() {
                return;
            }

            let policy = self.lock_state(|state| {
                state.scan_path(entry.scan_path_id.as_str()).cloned()
            });
            let Some(policy) = policy else {
                debug!(
                    path = %entry.file_path.display(),
                    "dropping rescan entry for removed scan path"
                );
                self.emit(Event::RescanResolved {
                    file_path: entry.file_path.clone(),
                })
                .await;
                continue;
            };

            match self.health.check(&entry.file_path, policy.detection_method).await {
                HealthVerdict::Healthy => {
                    info!(path = %entry.file_path.display(), "previously inaccessible file is healthy");
                    self.emit(Event::RescanResolved {
                        file_path: entry.file_path.clone(),
                    })
                    .await;
                }
                HealthVerdict::Corrupt { kind, detail } => {
                    self.emit(Event::RescanResolved {
                        file_path: entry.file_path.clone(),
                    })
                    .await;
                    if self.has_active_corruption_for(&entry.file_path) {
                        continue;
                    }
                    info!(
                        path = %entry.file_path.display(),
                        %kind,
                        "rescan found real corruption"
                    );
                    self.emit(Event::CorruptionDetected {
                        id: CorruptionId::new(UuidIdGen.next()),
                        file_path: entry.file_path.clone(),
                        scan_path_id: entry.scan_path_id.clone(),
                        corruption_type: kind,
                        detail,
                    })
                    .await;
                }
                HealthVerdict::Inaccessible { reason } => {
                    let attempts = entry.attempts + 1;
                    if entry.attempts_exhausted() {
                        warn!(
                            path = %entry.file_path.display(),
                            attempts,
                            reason,
                            "giving up on inaccessible file"
                        );
                        self.emit(Event::RescanResolved {
                            file_path: entry.file_path.clone(),
                        })
                        .await;
                    } else {
                        let delay = rescan_backoff(attempts);
                        debug!(
                            path = %entry.file_path.display(),
                            attempts,
                            delay_secs = delay.as_secs(),
                            "still inaccessible, backing off"
                        );
                        self.emit(Event::RescanQueued {
                            file_path: entry.file_path.clone(),
                            scan_path_id: entry.scan_path_id.clone(),
                            reason,
                            attempts,
                            next_retry_at_ms: self.clock.epoch_ms() + delay.as_millis() as u64,
                        })
                        .await;
                    }
                }
            }
        }
    }
}
