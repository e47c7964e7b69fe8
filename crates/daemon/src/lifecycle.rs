// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, recovery, shutdown.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs2::FileExt;
use mendarr_adapters::{
    CommandHealthChecker, HttpArrClient, RateLimits, RetryPolicy, SecretBox,
};
use mendarr_core::{Event, SystemClock};
use mendarr_engine::{Runtime, RuntimeDeps};
use mendarr_storage::{
    integrity_check, load_snapshot, Checkpointer, MaterializedState, Wal,
};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{ConfigError, DaemonConfig, StorePaths};
use crate::event_bus::{EventBus, EventReader};

/// Hard bound on the coordinated shutdown drain.
pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

/// Daemon runtime with concrete adapter types
pub type DaemonRuntime = Runtime<CommandHealthChecker, HttpArrClient, SystemClock>;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("WAL error: {0}")]
    Wal(#[from] mendarr_storage::WalError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] mendarr_storage::SnapshotError),

    #[error("secret key error: {0}")]
    SecretKey(#[from] mendarr_adapters::SecretError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: DaemonConfig,
    pub paths: StorePaths,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Materialized state (shared with the runtime)
    pub state: Arc<Mutex<MaterializedState>>,
    /// Runtime for event processing
    pub runtime: Arc<DaemonRuntime>,
    /// Event bus for publishing
    pub event_bus: EventBus,
    /// When the daemon started
    pub start_time: Instant,
}

/// Result of daemon startup.
pub struct StartupResult {
    pub daemon: DaemonState,
    /// Event reader for the engine loop
    pub event_reader: EventReader,
}

impl DaemonState {
    /// Process one durable event through the runtime.
    ///
    /// The event is applied to the materialized state first, then
    /// dispatched; result events are persisted to the WAL and processed
    /// by the engine loop on a later iteration, ensuring single delivery.
    pub async fn process_event(
        &mut self,
        seq: u64,
        created_at_ms: u64,
        event: Event,
    ) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.lock();
            state.apply(seq, created_at_ms, &event);
        }

        match self.runtime.handle_event(seq, &event).await {
            Ok(result_events) => {
                for result_event in result_events {
                    if let Err(e) = self.event_bus.publish(result_event) {
                        warn!("failed to persist runtime result event: {e}");
                    }
                }
            }
            Err(e) => {
                // An unprocessable event must not wedge the loop; the
                // failure is logged with context and the worker moves on
                warn!(seq, error = %e, "error handling event");
            }
        }

        Ok(())
    }

    /// Publish the tick-driven services' result events.
    pub fn publish_all(&self, events: Vec<Event>) {
        for event in events {
            if let Err(e) = self.event_bus.publish(event) {
                warn!("failed to publish tick event: {e}");
            }
        }
    }

    /// Shutdown the daemon gracefully: drain workers in reverse start
    /// order, flush the WAL, save a final snapshot, release the lock.
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("shutting down...");

        // 1. Stop the engine's workers (scans persist their position)
        self.runtime.begin_shutdown(SHUTDOWN_DEADLINE).await;

        // Give the forwarder a beat to move the workers' final events
        // (scan:paused and friends) into the WAL before flushing
        tokio::time::sleep(Duration::from_millis(50)).await;

        // 2. Flush buffered WAL events to disk
        if let Err(e) = self.event_bus.flush() {
            warn!("failed to flush WAL on shutdown: {e}");
        }

        // 3. Save a final snapshot so the next startup replays nothing
        let processed_seq = self.event_bus.processed_seq();
        if processed_seq > 0 {
            let state_clone = self.state.lock().clone();
            let checkpointer = Checkpointer::new(self.paths.snapshot_path.clone());
            match checkpointer.checkpoint_sync(processed_seq, &state_clone) {
                Ok(result) => info!(
                    seq = result.seq,
                    size_bytes = result.size_bytes,
                    "saved final shutdown snapshot"
                ),
                Err(e) => warn!("failed to save shutdown snapshot: {e}"),
            }
        }

        // 4. Remove the PID and version files; the lock releases on drop
        for path in [&self.paths.lock_path, &self.paths.version_path] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), "failed to remove file: {e}");
                }
            }
        }

        info!("shutdown complete");
        Ok(())
    }
}

/// Start the daemon: lock, recover state, build the runtime, sync
/// configuration, resume interrupted work.
pub async fn startup(config: DaemonConfig) -> Result<StartupResult, LifecycleError> {
    let paths = config.store_paths()?;

    // 1. Create the data directory, owner-only where supported
    create_private_dir(&paths.data_dir)?;

    // 2. Acquire the lock file FIRST - prevents races. Open without
    // truncating so a failed lock doesn't wipe the running daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    {
        use std::io::Write;
        let mut lock_file = &lock_file;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    std::fs::write(&paths.version_path, env!("CARGO_PKG_VERSION"))?;

    // 3. Surface (but survive) store integrity problems
    let report = integrity_check(&paths.snapshot_path, &paths.wal_path);
    if !report.is_ok() {
        warn!(?report, "store integrity check reported problems");
    }

    // 4. Load state from the snapshot (migrating if needed) and replay
    // the WAL tail. A migration failure aborts startup here.
    let (mut state, processed_seq) = match load_snapshot(&paths.snapshot_path)? {
        Some(snapshot) => {
            info!(
                seq = snapshot.seq,
                corruptions = snapshot.state.corruptions.len(),
                scans = snapshot.state.scans.len(),
                "loaded snapshot"
            );
            (snapshot.state, snapshot.seq)
        }
        None => {
            info!("no snapshot found, starting with empty state");
            (MaterializedState::default(), 0)
        }
    };

    let event_wal = Wal::open(&paths.wal_path, processed_seq)?;
    let events_to_replay = event_wal.entries_after(processed_seq)?;
    let replay_count = events_to_replay.len();
    let (event_bus, event_reader) = EventBus::new(event_wal);
    for entry in events_to_replay {
        state.apply(entry.seq, entry.created_at_ms, &entry.event);
    }
    if replay_count > 0 {
        info!(replay_count, after_seq = processed_seq, "replayed WAL events");
    }

    info!(
        corruptions = state.corruptions.len(),
        scans = state.scans.len(),
        pending_rescans = state.pending_rescans.len(),
        "recovered state"
    );

    // 5. Build adapters
    let secrets = match &config.secret_key {
        Some(key) => SecretBox::from_base64_key(key)?,
        None => SecretBox::unkeyed(),
    };
    let arr = HttpArrClient::new(
        RateLimits {
            rps: config.rate_limit.rps,
            burst: config.rate_limit.burst,
        },
        RetryPolicy::default(),
        config.allow_private_urls,
        secrets.clone(),
    );
    let health = CommandHealthChecker::new(config.probe_bin.clone())
        .with_timeout(Duration::from_secs(config.probe_timeout_secs));

    // 6. Internal channel for worker tasks to emit events, forwarded to
    // the bus with an immediate flush per batch
    let (internal_tx, internal_rx) = mpsc::channel::<Event>(256);
    spawn_event_forwarder(internal_rx, event_bus.clone());

    // 7. Build the runtime
    let state = Arc::new(Mutex::new(state));
    let runtime = Arc::new(Runtime::new(
        RuntimeDeps {
            health,
            arr,
            state: Arc::clone(&state),
        },
        SystemClock,
        config.runtime_config(),
        internal_tx,
    ));

    // 8. Sync file-configured scan paths, instances and schedules into
    // the store (encrypting any plaintext credentials on the way)
    sync_configuration(&config, &secrets, &state, &event_bus);

    // 9. Resume interrupted scans and re-arm verification waiters
    runtime.recover();

    info!("daemon started");

    Ok(StartupResult {
        daemon: DaemonState {
            config,
            paths,
            lock_file,
            state,
            runtime,
            event_bus,
            start_time: Instant::now(),
        },
        event_reader,
    })
}

/// Upsert config-file records into the store as events.
///
/// Credential encryption is one-shot: a plaintext API key is re-written
/// as ciphertext the first time a key is configured, and a settings
/// marker records that the migration ran.
fn sync_configuration(
    config: &DaemonConfig,
    secrets: &SecretBox,
    state: &Arc<Mutex<MaterializedState>>,
    event_bus: &EventBus,
) {
    let mut events = Vec::new();

    for scan_path in &config.scan_paths {
        let known = state
            .lock()
            .scan_path(scan_path.id.as_str())
            .map(|existing| existing == scan_path)
            .unwrap_or(false);
        if !known {
            events.push(Event::ScanPathConfigured {
                config: scan_path.clone(),
            });
        }
    }

    let mut migrated = false;
    for instance in &config.instances {
        let mut instance = instance.clone();
        if secrets.has_key() && !SecretBox::is_encrypted(&instance.api_key) {
            match secrets.encrypt(&instance.api_key) {
                Ok(ciphertext) => {
                    instance.api_key = ciphertext;
                    migrated = true;
                }
                Err(e) => warn!(instance = %instance.id, "cannot encrypt API key: {e}"),
            }
        }
        let known = state
            .lock()
            .arr_instances
            .get(instance.id.as_str())
            .map(|existing| *existing == instance)
            .unwrap_or(false);
        if !known {
            events.push(Event::ArrInstanceConfigured { instance });
        }
    }
    if migrated {
        events.push(Event::SettingUpdated {
            key: "credentials_encrypted".to_string(),
            value: "true".to_string(),
        });
    }

    for schedule in &config.schedules {
        let known = state
            .lock()
            .schedules
            .get(schedule.id.as_str())
            .map(|existing| existing.config == *schedule)
            .unwrap_or(false);
        if !known {
            events.push(Event::ScheduleAdded {
                schedule: schedule.clone(),
            });
        }
    }

    for event in events {
        if let Err(e) = event_bus.publish(event) {
            warn!("failed to publish configuration event: {e}");
        }
    }
}

/// Forward worker-emitted events to the bus, flushing each batch so
/// engine-produced events never sit in the group-commit window.
fn spawn_event_forwarder(mut rx: mpsc::Receiver<Event>, event_bus: EventBus) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if event_bus.publish(event).is_err() {
                warn!("failed to forward runtime event to WAL");
                continue;
            }
            while let Ok(event) = rx.try_recv() {
                if event_bus.publish(event).is_err() {
                    warn!("failed to forward runtime event to WAL");
                }
            }
            if let Err(e) = event_bus.flush() {
                tracing::error!("failed to flush runtime events: {e}");
            }
        }
    });
}

/// Create a directory restricted to the owner where the platform
/// supports modes.
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(path)
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(path)
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
