// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::DaemonConfig;
use mendarr_core::{
    CorruptionId, CorruptionKind, Event, InstanceId, ScanPathConfig, ScanPathId,
};
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::time::timeout;

fn test_config(dir: &TempDir) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.data_dir = Some(dir.path().join("data"));
    config.scan_paths = vec![ScanPathConfig {
        id: ScanPathId::new("movies"),
        local_root: dir.path().join("media"),
        remote_root: PathBuf::from("/movies"),
        instance_id: InstanceId::new("radarr"),
        enabled: true,
        auto_remediate: false, // keep tests off the network
        dry_run: false,
        detection_method: Default::default(),
        max_retries: 3,
        verification_timeout_secs: 60,
        verification_interval_secs: 1,
    }];
    config
}

fn detection() -> Event {
    Event::CorruptionDetected {
        id: CorruptionId::new("c-1"),
        file_path: PathBuf::from("/media/a.mkv"),
        scan_path_id: ScanPathId::new("movies"),
        corruption_type: CorruptionKind::Truncated,
        detail: "short".to_string(),
    }
}

/// Drain and process everything currently in the reader.
async fn drain(daemon: &mut DaemonState, reader: &mut EventReader) {
    while let Ok(Ok(Some(entry))) =
        timeout(std::time::Duration::from_millis(200), reader.recv()).await
    {
        let seq = entry.seq;
        daemon
            .process_event(seq, entry.created_at_ms, entry.event)
            .await
            .expect("process_event");
        reader.mark_processed(seq);
    }
}

#[tokio::test]
async fn startup_syncs_file_configuration_into_the_store() {
    let dir = TempDir::new().unwrap();
    let StartupResult {
        mut daemon,
        mut event_reader,
    } = startup(test_config(&dir)).await.unwrap();

    drain(&mut daemon, &mut event_reader).await;

    let state = daemon.state.lock();
    assert!(state.scan_path("movies").is_some());
}

#[tokio::test]
async fn second_daemon_cannot_take_the_lock() {
    let dir = TempDir::new().unwrap();
    let _first = startup(test_config(&dir)).await.unwrap();

    let err = startup(test_config(&dir)).await.map(|_| ()).unwrap_err();
    assert!(matches!(err, LifecycleError::LockFailed(_)));
}

#[tokio::test]
async fn crash_recovery_replays_flushed_events() {
    let dir = TempDir::new().unwrap();

    {
        let StartupResult {
            mut daemon,
            mut event_reader,
        } = startup(test_config(&dir)).await.unwrap();
        drain(&mut daemon, &mut event_reader).await;

        daemon.event_bus.publish(detection()).unwrap();
        daemon.event_bus.flush().unwrap();
        // Simulated crash: no shutdown, no snapshot
    }

    let StartupResult {
        mut daemon,
        mut event_reader,
    } = startup(test_config(&dir)).await.unwrap();
    drain(&mut daemon, &mut event_reader).await;

    let state = daemon.state.lock();
    assert_eq!(state.read_aggregate("c-1").len(), 1);
    assert_eq!(state.dashboard_stats().active_corruptions, 1);
}

#[tokio::test]
async fn graceful_shutdown_snapshots_so_restart_replays_nothing() {
    let dir = TempDir::new().unwrap();
    let snapshot_path = {
        let StartupResult {
            mut daemon,
            mut event_reader,
        } = startup(test_config(&dir)).await.unwrap();

        daemon.event_bus.publish(detection()).unwrap();
        drain(&mut daemon, &mut event_reader).await;
        daemon.shutdown().await.unwrap();
        daemon.paths.snapshot_path.clone()
    };

    assert!(snapshot_path.exists());
    let snapshot = load_snapshot(&snapshot_path).unwrap().unwrap();
    assert_eq!(snapshot.state.read_aggregate("c-1").len(), 1);

    // Restart: the snapshot carries everything, nothing to replay
    let StartupResult { daemon, .. } = startup(test_config(&dir)).await.unwrap();
    let state = daemon.state.lock();
    assert_eq!(state.read_aggregate("c-1").len(), 1);
}

#[tokio::test]
async fn terminal_aggregate_is_not_extended_across_restarts() {
    let dir = TempDir::new().unwrap();

    {
        let StartupResult {
            mut daemon,
            mut event_reader,
        } = startup(test_config(&dir)).await.unwrap();
        drain(&mut daemon, &mut event_reader).await;

        daemon.event_bus.publish(detection()).unwrap();
        daemon
            .event_bus
            .publish(Event::CorruptionIgnored {
                id: CorruptionId::new("c-1"),
            })
            .unwrap();
        // An event that must be rejected: the aggregate is terminal
        daemon
            .event_bus
            .publish(Event::SearchStarted {
                id: CorruptionId::new("c-1"),
            })
            .unwrap();
        drain(&mut daemon, &mut event_reader).await;
        daemon.shutdown().await.unwrap();
    }

    let StartupResult { daemon, .. } = startup(test_config(&dir)).await.unwrap();
    let state = daemon.state.lock();
    assert_eq!(state.read_aggregate("c-1").len(), 2);
    assert!(state.corruption_is_terminal("c-1"));
}

#[tokio::test]
async fn version_and_pid_files_are_written_and_cleared() {
    let dir = TempDir::new().unwrap();
    let StartupResult {
        mut daemon,
        event_reader: _event_reader,
    } = startup(test_config(&dir)).await.unwrap();

    assert!(daemon.paths.lock_path.exists());
    assert!(daemon.paths.version_path.exists());
    let pid = std::fs::read_to_string(&daemon.paths.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    daemon.shutdown().await.unwrap();
    assert!(!daemon.paths.lock_path.exists());
    assert!(!daemon.paths.version_path.exists());
}
