// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mendarr daemon (mendarrd)
//!
//! Background process that owns the event loop and the health-management
//! services.
//!
//! Architecture:
//! - Engine loop: processes durable events sequentially from the WAL
//! - Tick branches: scheduler (1s), monitor and rescan worker (periodic)
//! - Background tasks: WAL flush, checkpoint, backup, retention

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mendarr_core::Event;
use mendarr_daemon::config::DaemonConfig;
use mendarr_daemon::lifecycle::{self, LifecycleError, StartupResult};
use mendarr_daemon::EventBus;
use mendarr_storage::{BackupManager, Checkpointer, MaterializedState, Wal};
use parking_lot::Mutex;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config_path = PathBuf::from("mendarr.toml");
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("mendarrd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                let Some(path) = args.next() else {
                    eprintln!("error: --config requires a path");
                    std::process::exit(1);
                };
                config_path = PathBuf::from(path);
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: mendarrd [--config <path>] [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    if let Ok(path) = std::env::var("MENDARR_CONFIG") {
        if !path.is_empty() {
            config_path = PathBuf::from(path);
        }
    }

    let config = DaemonConfig::load(&config_path)?;
    let paths = config.store_paths()?;

    // Rotate the log file if it has grown too large, then set up tracing
    rotate_log_if_needed(&paths.log_path);
    let _log_guard = setup_logging(&paths.log_path, &config.log_level)?;

    info!(config = %config_path.display(), data_dir = %paths.data_dir.display(), "starting mendarrd");

    let StartupResult {
        mut daemon,
        mut event_reader,
    } = match lifecycle::startup(config).await {
        Ok(result) => result,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&paths.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("mendarrd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start daemon: {e}");
            return Err(e.into());
        }
    };

    // Background tasks: flush (group commit), checkpoint + WAL truncate,
    // backups, retention pruning
    spawn_flush_task(daemon.event_bus.clone());
    spawn_checkpoint(
        Arc::clone(&daemon.state),
        event_reader.wal(),
        daemon.paths.snapshot_path.clone(),
    );
    spawn_backup_task(
        daemon.paths.snapshot_path.clone(),
        daemon.paths.backups_dir.clone(),
        daemon.config.backup_retain,
        daemon.config.backup_interval_hours,
        event_reader.wal(),
        Arc::clone(&daemon.state),
    );
    spawn_retention_task(
        Arc::clone(&daemon.state),
        daemon.config.clone(),
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    // Tick cadences for the time-driven services
    let mut scheduler_tick = tokio::time::interval(Duration::from_secs(1));
    let mut monitor_tick = tokio::time::interval(Duration::from_secs(60));
    let mut rescan_tick = tokio::time::interval(Duration::from_secs(30));

    info!("daemon ready");
    println!("READY");

    // Engine loop - processes events sequentially from the WAL
    loop {
        tokio::select! {
            result = event_reader.recv() => {
                match result {
                    Ok(Some(entry)) => {
                        let seq = entry.seq;
                        match entry.event {
                            Event::Shutdown => {
                                // Control signal, never replayed on restart
                                event_reader.mark_processed(seq);
                            }
                            event => {
                                if let Err(e) = daemon
                                    .process_event(seq, entry.created_at_ms, event)
                                    .await
                                {
                                    // Unprocessable events must not block
                                    // the loop
                                    error!("error processing event (seq={seq}): {e}");
                                }
                                event_reader.mark_processed(seq);
                            }
                        }
                    }
                    Ok(None) => {
                        info!("event bus closed, shutting down...");
                        break;
                    }
                    Err(e) => {
                        error!("error reading from WAL: {e}");
                    }
                }
            }

            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down...");
                break;
            }

            _ = sigint.recv() => {
                info!("received SIGINT, shutting down...");
                break;
            }

            _ = scheduler_tick.tick() => {
                let events = daemon.runtime.scheduler_tick();
                daemon.publish_all(events);
            }

            _ = monitor_tick.tick() => {
                let events = daemon.runtime.monitor_tick();
                daemon.publish_all(events);
            }

            _ = rescan_tick.tick() => {
                daemon.runtime.spawn_rescan_pass();
            }
        }
    }

    daemon.shutdown().await?;
    info!("daemon stopped");
    Ok(())
}

fn print_help() {
    println!("mendarrd {}", env!("CARGO_PKG_VERSION"));
    println!("Media-library health supervisor daemon");
    println!();
    println!("USAGE:");
    println!("    mendarrd [--config <path>]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config     Path to the TOML configuration (default: mendarr.toml,");
    println!("                     or the MENDARR_CONFIG environment variable)");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
}

/// Flush interval for group commit (~10ms durability window)
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Spawn a task that periodically flushes the event bus.
fn spawn_flush_task(event_bus: EventBus) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);

        loop {
            interval.tick().await;

            if event_bus.needs_flush() {
                if let Err(e) = event_bus.flush() {
                    tracing::error!("failed to flush event bus: {e}");
                }
            }
        }
    });
}

/// Checkpoint interval (60 seconds)
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn a task that periodically saves snapshots and truncates the WAL.
///
/// WAL truncation only happens after the snapshot is fully durable
/// (tmp write → fsync → rename → directory fsync), so no data is lost
/// even on a crash mid-checkpoint.
fn spawn_checkpoint(
    state: Arc<Mutex<MaterializedState>>,
    event_wal: Arc<Mutex<Wal>>,
    snapshot_path: PathBuf,
) {
    let checkpointer = Checkpointer::new(snapshot_path);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHECKPOINT_INTERVAL);

        loop {
            interval.tick().await;

            let (state_clone, processed_seq) = {
                let state_guard = state.lock();
                let wal_guard = event_wal.lock();
                (state_guard.clone(), wal_guard.processed_seq())
            };

            if processed_seq == 0 {
                continue;
            }

            let handle = checkpointer.start(processed_seq, &state_clone);
            let result = tokio::task::spawn_blocking(move || handle.wait()).await;

            match result {
                Ok(Ok(checkpoint_result)) => {
                    tracing::debug!(
                        seq = checkpoint_result.seq,
                        size_bytes = checkpoint_result.size_bytes,
                        "checkpoint complete"
                    );

                    // NOW safe to truncate the WAL (snapshot is durable)
                    let mut wal = event_wal.lock();
                    if let Err(e) = wal.truncate_before(processed_seq) {
                        warn!("failed to truncate WAL after checkpoint: {e}");
                    }
                }
                Ok(Err(e)) => {
                    warn!("checkpoint failed, WAL not truncated: {e}");
                }
                Err(e) => {
                    warn!("checkpoint task panicked: {e}");
                }
            }
        }
    });
}

/// Spawn the scheduled backup task.
///
/// A backup forces a fresh checkpoint first, so the copied artifact
/// reflects every processed event and opens unchanged in the same
/// engine.
fn spawn_backup_task(
    snapshot_path: PathBuf,
    backups_dir: PathBuf,
    retain: usize,
    interval_hours: u64,
    event_wal: Arc<Mutex<Wal>>,
    state: Arc<Mutex<MaterializedState>>,
) {
    if interval_hours == 0 {
        return;
    }
    let manager = BackupManager::new(backups_dir, retain);
    let checkpointer = Checkpointer::new(snapshot_path.clone());

    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(interval_hours * 60 * 60));
        // The first tick fires immediately; skip it so the daemon has
        // settled before the first backup
        interval.tick().await;

        loop {
            interval.tick().await;

            let (state_clone, seq) = {
                let state_guard = state.lock();
                let wal_guard = event_wal.lock();
                (state_guard.clone(), wal_guard.processed_seq())
            };
            if seq > 0 {
                if let Err(e) = checkpointer.checkpoint_sync(seq, &state_clone) {
                    warn!("pre-backup checkpoint failed: {e}");
                    continue;
                }
            }

            match manager.create(&snapshot_path, seq) {
                Ok(artifact) => info!(artifact = %artifact.display(), "scheduled backup complete"),
                Err(e) => warn!("scheduled backup failed: {e}"),
            }
        }
    });
}

/// Retention sweep interval (hourly; the cutoff does the real gating).
const RETENTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Spawn the retention pruning task.
fn spawn_retention_task(state: Arc<Mutex<MaterializedState>>, config: DaemonConfig) {
    if config.retention_days == 0 {
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RETENTION_INTERVAL);
        interval.tick().await;

        loop {
            interval.tick().await;

            let now_ms = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64;
            let Some(cutoff) = config.retention_cutoff(now_ms) else {
                continue;
            };

            let report = {
                let mut state = state.lock();
                state.prune(cutoff)
            };
            if !report.is_empty() {
                info!(?report, "retention pruning complete");
            }
        }
    });
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `mendarrd.log` → `.1` → `.2` → `.3`, deleting the oldest.
/// Best-effort: rotation failures must not stop the daemon.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    log_path: &std::path::Path,
    level: &str,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = log_path.parent().ok_or("log path has no parent")?;
    std::fs::create_dir_all(parent)?;
    let file_name = log_path.file_name().ok_or("log path has no file name")?;

    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
