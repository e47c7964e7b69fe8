// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan lifecycle: traversal, counters, resume, cancellation, pause.

use super::*;
use mendarr_core::{ScanId, ScanStatus};
use tempfile::TempDir;

fn media_tree(files: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, format!("media bytes for {name}")).unwrap();
    }
    dir
}

async fn request_scan(rig: &mut TestRig) {
    rig.deliver(Event::ScanRequested {
        scan_path_id: ScanPathId::new("movies"),
        root: None,
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn scan_of_healthy_tree_completes_with_counters() {
    let root = media_tree(&["a.mkv", "b.mkv", "sub/c.mkv"]);
    let mut rig = seeded_rig(root.path());

    request_scan(&mut rig).await;
    rig.pump_until(|e| matches!(e, Event::ScanCompleted { .. }))
        .await;

    let state = rig.state.lock();
    let scan = state.scans.values().next().unwrap();
    assert_eq!(scan.status, ScanStatus::Completed);
    assert_eq!(scan.files_seen, 3);
    assert_eq!(scan.files_scanned, 3);
    assert_eq!(scan.corruptions_found, 0);
    assert_eq!(state.scan_files[&scan.id.0].len(), 3);
}

#[tokio::test(start_paused = true)]
async fn corrupt_file_produces_one_detection() {
    let root = media_tree(&["a.mkv", "bad.mkv"]);
    let mut rig = seeded_rig(root.path());
    rig.health.set_verdict(
        root.path().join("bad.mkv"),
        HealthVerdict::Corrupt {
            kind: CorruptionKind::VideoStream,
            detail: "undecodable".to_string(),
        },
    );

    request_scan(&mut rig).await;
    let seen = rig
        .pump_until(|e| matches!(e, Event::ScanCompleted { .. }))
        .await;

    let detections: Vec<_> = seen
        .iter()
        .filter(|e| matches!(e, Event::CorruptionDetected { .. }))
        .collect();
    assert_eq!(detections.len(), 1);

    let state = rig.state.lock();
    let scan = state.scans.values().next().unwrap();
    assert_eq!(scan.corruptions_found, 1);
    assert_eq!(scan.files_scanned, 2);

    let status = state.corruption_statuses().pop().unwrap();
    assert_eq!(status.file_path, root.path().join("bad.mkv"));
}

#[tokio::test(start_paused = true)]
async fn inaccessible_file_queues_rescan_without_detection() {
    let root = media_tree(&["a.mkv", "b.mkv"]);
    let mut rig = seeded_rig(root.path());
    rig.health.set_verdict(
        root.path().join("b.mkv"),
        HealthVerdict::Inaccessible {
            reason: "mount_lost".to_string(),
        },
    );

    request_scan(&mut rig).await;
    rig.pump_until(|e| matches!(e, Event::ScanCompleted { .. }))
        .await;

    let state = rig.state.lock();
    let scan = state.scans.values().next().unwrap();
    assert_eq!(scan.corruptions_found, 0);
    assert!(state.corruptions.is_empty());
    assert_eq!(state.pending_rescans.len(), 1);
    let entry = state.pending_rescans.values().next().unwrap();
    assert_eq!(entry.reason, "mount_lost");
    assert_eq!(entry.attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn resumed_scan_skips_unchanged_healthy_files() {
    let root = media_tree(&["a.mkv", "b.mkv", "c.mkv"]);
    let mut rig = seeded_rig(root.path());

    request_scan(&mut rig).await;
    rig.pump_until(|e| matches!(e, Event::ScanCompleted { .. }))
        .await;
    let first_checks = rig.health.checks().len();
    assert_eq!(first_checks, 3);

    // Simulate the restart recovery path: force the scan back to running
    // and resume it
    let scan_id = {
        let mut state = rig.state.lock();
        let id = *state.scans.keys().next().unwrap();
        if let Some(scan) = state.scans.get_mut(&id) {
            scan.status = ScanStatus::Paused;
        }
        ScanId(id)
    };
    rig.runtime.spawn_scan(scan_id, true);
    rig.pump_until(|e| matches!(e, Event::ScanCompleted { .. }))
        .await;

    // Healthy unchanged files were not re-checked
    assert_eq!(rig.health.checks().len(), first_checks);
    let state = rig.state.lock();
    assert_eq!(state.scans[&scan_id.0].files_scanned, 3);
}

#[tokio::test(start_paused = true)]
async fn resumed_scan_rechecks_changed_and_corrupt_files() {
    let root = media_tree(&["a.mkv", "bad.mkv"]);
    // Manual-remediation path: the aggregate stays active so the resume
    // can prove detections are not duplicated
    let mut rig = TestRig::new();
    let mut path = TestRig::movies_path(root.path());
    path.auto_remediate = false;
    rig.seed(Event::ScanPathConfigured { config: path });
    rig.health.set_verdict(
        root.path().join("bad.mkv"),
        HealthVerdict::Corrupt {
            kind: CorruptionKind::Truncated,
            detail: "short".to_string(),
        },
    );

    request_scan(&mut rig).await;
    rig.pump_until(|e| matches!(e, Event::ScanCompleted { .. }))
        .await;

    let scan_id = {
        let mut state = rig.state.lock();
        let id = *state.scans.keys().next().unwrap();
        if let Some(scan) = state.scans.get_mut(&id) {
            scan.status = ScanStatus::Paused;
        }
        ScanId(id)
    };
    rig.runtime.spawn_scan(scan_id, true);
    rig.pump_until(|e| matches!(e, Event::ScanCompleted { .. }))
        .await;

    // bad.mkv was re-checked (corrupt rows never skip), a.mkv was not
    assert_eq!(rig.health.check_count(&root.path().join("bad.mkv")), 2);
    assert_eq!(rig.health.check_count(&root.path().join("a.mkv")), 1);

    // The detection was not duplicated for the still-tracked aggregate
    assert_eq!(rig.state.lock().corruptions.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_requested_before_the_worker_runs_finalizes_the_scan() {
    let root = media_tree(&["a.mkv", "b.mkv"]);
    let mut rig = seeded_rig(root.path());

    // Scan queued and flagged cancelling before any worker existed
    // (daemon restarted mid-cancel)
    let scan_id = ScanId(1);
    rig.seed(Event::ScanQueued {
        scan_id,
        scan_path_id: ScanPathId::new("movies"),
        root: root.path().to_path_buf(),
    });
    rig.seed(Event::ScanCancelRequested { scan_id });

    rig.runtime.spawn_scan(scan_id, true);
    rig.pump_until(|e| matches!(e, Event::ScanCancelled { .. }))
        .await;

    let state = rig.state.lock();
    assert_eq!(state.scans[&scan_id.0].status, ScanStatus::Cancelled);
    // Nothing was visited after the cancel point
    assert!(state.scan_files.get(&scan_id.0).is_none());
    assert!(rig.health.checks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn progress_events_are_coalesced() {
    let root = media_tree(&["a.mkv", "b.mkv", "c.mkv", "d.mkv", "e.mkv", "f.mkv"]);
    let mut rig = TestRig::with_config(RuntimeConfig {
        progress_every_files: 3,
        progress_every: Duration::from_secs(3600),
        ..RuntimeConfig::default()
    });
    rig.seed(Event::ScanPathConfigured {
        config: TestRig::movies_path(root.path()),
    });
    rig.seed(Event::ArrInstanceConfigured {
        instance: TestRig::radarr(),
    });

    request_scan(&mut rig).await;
    let seen = rig
        .pump_until(|e| matches!(e, Event::ScanCompleted { .. }))
        .await;

    let progress = seen
        .iter()
        .filter(|e| matches!(e, Event::ScanProgress { .. }))
        .count();
    // 6 files at one progress per 3, plus the final flush
    assert_eq!(progress, 3);
}

#[tokio::test(start_paused = true)]
async fn scan_request_for_unknown_path_is_refused() {
    let mut rig = TestRig::new();
    rig.deliver(Event::ScanRequested {
        scan_path_id: ScanPathId::new("nope"),
        root: None,
    })
    .await;
    rig.assert_quiet().await;
    assert!(rig.state.lock().scans.is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_request_while_scan_is_live_is_refused() {
    let root = media_tree(&["a.mkv"]);
    let mut rig = seeded_rig(root.path());

    request_scan(&mut rig).await;
    // The queued event sits unprocessed; a second request sees the record
    let first = rig.pump().await.unwrap();
    assert!(matches!(first, Event::ScanQueued { .. }));

    request_scan(&mut rig).await;
    rig.pump_until(|e| matches!(e, Event::ScanCompleted { .. }))
        .await;

    assert_eq!(rig.state.lock().scans.len(), 1);
}
