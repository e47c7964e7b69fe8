// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rescan worker: backoff, recovery and promotion to detection.

use super::*;
use mendarr_core::rescan::MAX_RESCAN_ATTEMPTS;

fn pending(rig: &mut TestRig, path: &str, attempts: u32) {
    rig.seed(Event::RescanQueued {
        file_path: path.into(),
        scan_path_id: ScanPathId::new("movies"),
        reason: "mount_lost".to_string(),
        attempts,
        next_retry_at_ms: 0, // due immediately
    });
}

#[tokio::test(start_paused = true)]
async fn recovered_file_resolves_the_entry() {
    let mut rig = seeded_rig("/mnt/media/movies");
    pending(&mut rig, "/mnt/media/movies/b.mkv", 0);
    // FakeHealthChecker defaults to healthy

    rig.runtime.spawn_rescan_pass();
    rig.pump_until(|e| matches!(e, Event::RescanResolved { .. }))
        .await;

    assert!(rig.state.lock().pending_rescans.is_empty());
    assert!(rig.state.lock().corruptions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn still_inaccessible_backs_off_with_more_attempts() {
    let mut rig = seeded_rig("/mnt/media/movies");
    pending(&mut rig, "/mnt/media/movies/b.mkv", 1);
    rig.health.set_verdict(
        "/mnt/media/movies/b.mkv",
        HealthVerdict::Inaccessible {
            reason: "mount_lost".to_string(),
        },
    );

    rig.runtime.spawn_rescan_pass();
    rig.pump_until(|e| matches!(e, Event::RescanQueued { attempts: 2, .. }))
        .await;

    let state = rig.state.lock();
    let entry = &state.pending_rescans["/mnt/media/movies/b.mkv"];
    assert_eq!(entry.attempts, 2);
    assert!(entry.next_retry_at_ms > rig.clock.epoch_ms());
}

#[tokio::test(start_paused = true)]
async fn exhausted_attempts_drop_the_entry() {
    let mut rig = seeded_rig("/mnt/media/movies");
    pending(&mut rig, "/mnt/media/movies/b.mkv", MAX_RESCAN_ATTEMPTS);
    rig.health.set_verdict(
        "/mnt/media/movies/b.mkv",
        HealthVerdict::Inaccessible {
            reason: "mount_lost".to_string(),
        },
    );

    rig.runtime.spawn_rescan_pass();
    rig.pump_until(|e| matches!(e, Event::RescanResolved { .. }))
        .await;

    assert!(rig.state.lock().pending_rescans.is_empty());
    // Inaccessibility never became a detection
    assert!(rig.state.lock().corruptions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn corruption_found_on_rescan_detects() {
    let mut rig = seeded_rig("/mnt/media/movies");
    pending(&mut rig, "/mnt/media/movies/b.mkv", 0);
    rig.health.set_verdict(
        "/mnt/media/movies/b.mkv",
        HealthVerdict::Corrupt {
            kind: CorruptionKind::ContainerStructure,
            detail: "damaged index".to_string(),
        },
    );

    rig.runtime.spawn_rescan_pass();
    rig.pump_until(|e| matches!(e, Event::CorruptionDetected { .. }))
        .await;

    assert!(rig.state.lock().pending_rescans.is_empty());
    assert_eq!(rig.state.lock().corruptions.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn entries_not_yet_due_are_left_alone() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.seed(Event::RescanQueued {
        file_path: "/mnt/media/movies/b.mkv".into(),
        scan_path_id: ScanPathId::new("movies"),
        reason: "mount_lost".to_string(),
        attempts: 0,
        next_retry_at_ms: rig.clock.epoch_ms() + 60_000,
    });

    rig.runtime.spawn_rescan_pass();
    rig.assert_quiet().await;
    assert!(rig.health.checks().is_empty());
    assert_eq!(rig.state.lock().pending_rescans.len(), 1);
}
