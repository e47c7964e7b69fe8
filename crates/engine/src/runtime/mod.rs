// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the mendarr engine.
//!
//! One `Runtime` owns the service logic: `handle_event` dispatches each
//! durable event to its handler group, and tick methods drive the
//! time-based services (monitor, scheduler, rescan worker). Long-running
//! work (scans, remediations, verification waits) runs in spawned tasks
//! that feed result events back through the bus channel.

mod monitor;
mod remediate;
mod rescan;
mod scan;
mod schedule;
mod verify;

use crate::config::RuntimeConfig;
use crate::error::EngineError;
use mendarr_adapters::{ArrClient, HealthChecker};
use mendarr_core::{Clock, CorruptionId, Event, ScanId};
use mendarr_storage::MaterializedState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runtime adapter dependencies
pub struct RuntimeDeps<H, A> {
    pub health: H,
    pub arr: A,
    pub state: Arc<Mutex<MaterializedState>>,
}

/// Cooperative stop signals for a spawned worker task.
pub(crate) struct TaskControl {
    pub cancel: Arc<AtomicBool>,
    pub handle: JoinHandle<()>,
}

/// Runtime that coordinates the services
pub struct Runtime<H, A, C: Clock> {
    pub(crate) health: H,
    pub(crate) arr: A,
    pub(crate) clock: C,
    pub(crate) config: RuntimeConfig,
    pub(crate) state: Arc<Mutex<MaterializedState>>,
    pub(crate) event_tx: mpsc::Sender<Event>,
    /// Bounds concurrent health checks across all scans
    pub(crate) scanner_permits: Arc<Semaphore>,
    /// Live scan worker tasks by scan id
    pub(crate) scan_tasks: Mutex<HashMap<u64, TaskControl>>,
    /// One verification waiter per aggregate
    pub(crate) verify_tasks: Mutex<HashMap<String, TaskControl>>,
    /// Aggregates with a remediation task in flight
    pub(crate) remediations: Mutex<HashMap<String, JoinHandle<()>>>,
    /// Set while a rescan pass is running (one at a time)
    pub(crate) rescan_pass_running: AtomicBool,
    /// High-water mark for scan ids handed out this session, so two
    /// requests in one batch never collide before the first is applied
    pub(crate) scan_id_floor: Mutex<u64>,
    /// Per-schedule arm time for schedules that have never fired
    pub(crate) schedule_armed_at: Mutex<HashMap<String, u64>>,
    /// Process-wide stop signal: workers pause instead of cancelling
    pub(crate) shutting_down: AtomicBool,
}

impl<H, A, C> Runtime<H, A, C>
where
    H: HealthChecker,
    A: ArrClient,
    C: Clock,
{
    /// Create a new runtime
    pub fn new(
        deps: RuntimeDeps<H, A>,
        clock: C,
        config: RuntimeConfig,
        event_tx: mpsc::Sender<Event>,
    ) -> Self {
        let scanner_permits = Arc::new(Semaphore::new(config.scanner_concurrency.max(1)));
        Self {
            health: deps.health,
            arr: deps.arr,
            clock,
            config,
            state: deps.state,
            event_tx,
            scanner_permits,
            scan_tasks: Mutex::new(HashMap::new()),
            verify_tasks: Mutex::new(HashMap::new()),
            remediations: Mutex::new(HashMap::new()),
            rescan_pass_running: AtomicBool::new(false),
            scan_id_floor: Mutex::new(0),
            schedule_armed_at: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Helper to lock state for reading
    pub(crate) fn lock_state<T>(&self, f: impl FnOnce(&MaterializedState) -> T) -> T {
        let guard = self.state.lock();
        f(&guard)
    }

    /// Handle one durable event.
    ///
    /// `seq` is the event's store id; the daemon applies the event to the
    /// materialized state before dispatching here. Returned events are
    /// published back through the bus.
    pub async fn handle_event(
        self: &Arc<Self>,
        seq: u64,
        event: &Event,
    ) -> Result<Vec<Event>, EngineError> {
        // Corruption events rejected by the state fold (terminal aggregate,
        // out-of-order detection) must not reach handlers either.
        if let Some(id) = event.corruption_id() {
            let recorded = self.lock_state(|state| {
                state
                    .read_aggregate(id.as_str())
                    .last()
                    .map(|stored| stored.id == seq)
                    .unwrap_or(false)
            });
            if !recorded {
                debug!(
                    corruption_id = %id,
                    seq,
                    "skipping handlers for rejected corruption event"
                );
                return Ok(Vec::new());
            }
        }

        match event {
            Event::CorruptionDetected {
                id,
                file_path,
                scan_path_id,
                ..
            } => {
                self.handle_detection(id, file_path, scan_path_id);
                Ok(Vec::new())
            }

            Event::SearchCompleted { id } => {
                self.arm_verifier(id);
                Ok(Vec::new())
            }

            Event::RemediationFailed { id, .. }
            | Event::DeletionFailed { id, .. }
            | Event::SearchFailed { id, .. }
            | Event::VerificationFailed { id, .. } => Ok(self.enforce_retry_ceiling(id)),

            Event::VerificationSuccess { id }
            | Event::MaxRetriesReached { id, .. }
            | Event::CorruptionIgnored { id }
            | Event::ImportBlocked { id, .. }
            | Event::ManuallyRemoved { id } => {
                self.cancel_verifier(id);
                Ok(Vec::new())
            }

            Event::ScanRequested { scan_path_id, root } => {
                Ok(self.handle_scan_requested(scan_path_id, root.clone()))
            }

            Event::ScanQueued { scan_id, .. } => {
                self.spawn_scan(*scan_id, false);
                Ok(Vec::new())
            }

            Event::ScanCancelRequested { scan_id } => {
                self.signal_scan_cancel(*scan_id);
                Ok(Vec::new())
            }

            _ => Ok(Vec::new()),
        }
    }

    /// Send an event into the bus channel.
    ///
    /// For corruption events, drops silently when the aggregate is already
    /// terminal: a worker racing an operator command must not extend a
    /// closed story.
    pub(crate) async fn emit(&self, event: Event) {
        if let Some(id) = event.corruption_id() {
            let terminal = self.lock_state(|state| state.corruption_is_terminal(id.as_str()));
            if terminal {
                debug!(corruption_id = %id, kind = %event.log_summary(), "aggregate terminal, dropping event");
                return;
            }
        }
        if self.event_tx.send(event).await.is_err() {
            warn!("event channel closed, dropping event");
        }
    }

    /// Whether any non-terminal aggregate already tracks this file.
    pub(crate) fn has_active_corruption_for(&self, path: &std::path::Path) -> bool {
        self.lock_state(|state| {
            state
                .corruption_statuses()
                .iter()
                .any(|status| !status.is_terminal() && status.file_path == path)
        })
    }

    /// Operator command: ignore an aggregate (terminal).
    pub async fn ignore_corruption(&self, id: &CorruptionId) {
        self.emit(Event::CorruptionIgnored { id: id.clone() }).await;
    }

    /// Operator command: mark an aggregate's file manually removed
    /// (terminal).
    pub async fn mark_manually_removed(&self, id: &CorruptionId) {
        self.emit(Event::ManuallyRemoved { id: id.clone() }).await;
    }

    /// Begin shutdown: scans pause, new work is refused.
    ///
    /// The daemon drains in reverse start order; this flips the flag the
    /// workers poll, then waits for scan tasks to persist their position.
    pub async fn begin_shutdown(self: &Arc<Self>, deadline: std::time::Duration) {
        self.shutting_down.store(true, Ordering::SeqCst);

        let handles: Vec<(u64, JoinHandle<()>)> = {
            let mut tasks = self.scan_tasks.lock();
            tasks.drain().map(|(id, control)| (id, control.handle)).collect()
        };
        for (scan_id, handle) in handles {
            if tokio::time::timeout(deadline, handle).await.is_err() {
                warn!(scan_id, "scan worker did not pause within the shutdown deadline");
            }
        }

        // Verification waiters and remediations re-arm from the event log
        // on the next startup; stop them where they stand.
        for (_, control) in self.verify_tasks.lock().drain() {
            control.handle.abort();
        }
        for (_, handle) in self.remediations.lock().drain() {
            handle.abort();
        }
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Recovery pass after startup replay: resume interrupted scans and
    /// re-arm verification waiters for aggregates parked mid-verification.
    pub fn recover(self: &Arc<Self>) {
        let (scans_to_resume, waiting): (Vec<ScanId>, Vec<CorruptionId>) =
            self.lock_state(|state| {
                let scans = state
                    .scans
                    .values()
                    .filter(|scan| !scan.status.is_terminal())
                    .map(|scan| scan.id)
                    .collect();
                let waiting = state
                    .corruption_statuses()
                    .iter()
                    .filter(|status| !status.is_terminal() && status.state.awaits_verification())
                    .map(|status| status.id.clone())
                    .collect();
                (scans, waiting)
            });

        for scan_id in scans_to_resume {
            debug!(%scan_id, "resuming interrupted scan");
            self.spawn_scan(scan_id, true);
        }
        for id in waiting {
            debug!(corruption_id = %id, "re-arming verification after restart");
            self.arm_verifier(&id);
        }
    }
}

#[cfg(test)]
#[path = "../runtime_tests/mod.rs"]
mod tests;
