// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verification flows: download observation, import history, filesystem
//! wait, health check, timeout and cancellation.

use super::*;
use mendarr_adapters::{HistoryEntry, HistoryEventKind, QueueEntry};
use tempfile::TempDir;

/// Seed a rig whose aggregate has already completed remediation; the
/// returned detection delivery kicks off the full pipeline.
async fn remediated_rig(root: &TempDir) -> TestRig {
    let mut rig = seeded_rig(root.path());
    let local = root.path().join("a.mkv");
    let remote = std::path::Path::new("/movies").join("a.mkv");
    rig.arr.add_item(remote, item(42, 7));
    rig.deliver(detection_for(local)).await;
    rig
}

fn queued_entry(percent: Option<u8>) -> QueueEntry {
    QueueEntry {
        item_id: 42,
        title: "A Movie".to_string(),
        percent,
    }
}

#[tokio::test(start_paused = true)]
async fn happy_path_download_then_verify() {
    let root = TempDir::new().unwrap();
    let mut rig = remediated_rig(&root).await;

    // The item sits in the queue twice, then leaves
    rig.arr.push_queue_snapshot(vec![queued_entry(Some(50))]);
    rig.arr.push_queue_snapshot(vec![queued_entry(Some(90))]);
    rig.arr.push_queue_snapshot(vec![]);
    // The replacement is already on disk and healthy once the queue drains
    std::fs::write(root.path().join("a.mkv"), b"replacement bytes").unwrap();

    rig.pump_until(|e| matches!(e, Event::VerificationSuccess { .. }))
        .await;

    use CorruptionEventKind::*;
    assert_eq!(
        rig.aggregate_kinds("c-1"),
        vec![
            CorruptionDetected,
            RemediationStarted,
            DeletionStarted,
            DeletionCompleted,
            SearchStarted,
            SearchCompleted,
            DownloadQueued,
            DownloadProgress,
            DownloadProgress,
            VerificationStarted,
            VerificationSuccess,
        ]
    );

    let stats = rig.state.lock().dashboard_stats();
    assert_eq!(stats.resolved_corruptions, 1);
    assert_eq!(stats.active_corruptions, 0);
}

#[tokio::test(start_paused = true)]
async fn import_history_redirects_to_the_new_path() {
    let root = TempDir::new().unwrap();
    let mut rig = remediated_rig(&root).await;

    let imported_local = root.path().join("a [imported].mkv");
    std::fs::write(&imported_local, b"new").unwrap();

    // Queue is empty; history shows the import under the manager namespace
    rig.arr.add_history(HistoryEntry {
        item_id: 42,
        kind: HistoryEventKind::Imported,
        imported_path: Some(std::path::Path::new("/movies").join("a [imported].mkv")),
        date_ms: u64::MAX, // always "since"
    });

    rig.pump_until(|e| matches!(e, Event::VerificationSuccess { .. }))
        .await;

    let status = rig.state.lock().corruption_status("c-1").unwrap();
    assert_eq!(status.replacement_path, Some(imported_local));
}

#[tokio::test(start_paused = true)]
async fn failed_import_in_history_blocks() {
    let root = TempDir::new().unwrap();
    let mut rig = remediated_rig(&root).await;

    rig.arr.add_history(HistoryEntry {
        item_id: 42,
        kind: HistoryEventKind::ImportFailed,
        imported_path: None,
        date_ms: u64::MAX,
    });

    rig.pump_until(|e| matches!(e, Event::ImportBlocked { .. }))
        .await;
    assert!(rig.state.lock().corruption_is_terminal("c-1"));
}

#[tokio::test(start_paused = true)]
async fn grabbed_history_marks_the_import_in_progress() {
    let root = TempDir::new().unwrap();
    let mut rig = remediated_rig(&root).await;

    std::fs::write(root.path().join("a.mkv"), b"imported later").unwrap();
    rig.arr.add_history(HistoryEntry {
        item_id: 42,
        kind: HistoryEventKind::Grabbed,
        imported_path: None,
        date_ms: u64::MAX,
    });

    let seen = rig
        .pump_until(|e| matches!(e, Event::VerificationSuccess { .. }))
        .await;
    assert!(seen.iter().any(|e| matches!(e, Event::ImportStarted { .. })));
}

#[tokio::test(start_paused = true)]
async fn direct_lookup_uses_the_managers_current_path() {
    let root = TempDir::new().unwrap();
    let mut rig = remediated_rig(&root).await;

    let moved_local = root.path().join("moved.mkv");
    std::fs::write(&moved_local, b"moved").unwrap();
    // No queue entry, no history; the manager reports a new file path
    rig.arr
        .set_item_file(42, std::path::Path::new("/movies").join("moved.mkv"));

    rig.pump_until(|e| matches!(e, Event::VerificationSuccess { .. }))
        .await;

    let status = rig.state.lock().corruption_status("c-1").unwrap();
    assert_eq!(status.replacement_path, Some(moved_local));
}

#[tokio::test(start_paused = true)]
async fn corrupt_replacement_fails_verification() {
    let root = TempDir::new().unwrap();
    let mut rig = remediated_rig(&root).await;

    let path = root.path().join("a.mkv");
    std::fs::write(&path, b"still bad").unwrap();
    rig.health.set_verdict(
        &path,
        HealthVerdict::Corrupt {
            kind: CorruptionKind::VideoStream,
            detail: "again".to_string(),
        },
    );

    rig.pump_until(|e| matches!(e, Event::VerificationFailed { .. }))
        .await;

    let status = rig.state.lock().corruption_status("c-1").unwrap();
    assert_eq!(status.retry_count, 1);
    assert!(status.last_error.as_deref().unwrap_or("").contains("corrupt"));
}

#[tokio::test(start_paused = true)]
async fn file_detected_lands_when_the_wait_was_real() {
    let root = TempDir::new().unwrap();
    let mut rig = remediated_rig(&root).await;
    let path = root.path().join("a.mkv");

    // Wait for the verification to begin, then let the file appear
    rig.pump_until(|e| matches!(e, Event::VerificationStarted { .. }))
        .await;
    std::fs::write(&path, b"arrived").unwrap();

    let seen = rig
        .pump_until(|e| matches!(e, Event::VerificationSuccess { .. }))
        .await;
    assert!(seen.iter().any(|e| matches!(e, Event::FileDetected { .. })));
}

#[tokio::test(start_paused = true)]
async fn verification_times_out_when_nothing_arrives() {
    let root = TempDir::new().unwrap();
    let mut rig = remediated_rig(&root).await;

    // Nothing on disk, nothing in the queue or history. Let the waiter
    // start, then push the clock past the per-path timeout.
    rig.pump_until(|e| matches!(e, Event::VerificationStarted { .. }))
        .await;
    rig.clock.advance(Duration::from_secs(3601));

    let seen = rig
        .pump_until(|e| matches!(e, Event::VerificationFailed { .. }))
        .await;
    let error = seen
        .iter()
        .find_map(|e| match e {
            Event::VerificationFailed { error, .. } => Some(error.clone()),
            _ => None,
        })
        .unwrap_or_default();
    assert_eq!(error, "timeout");
}

#[tokio::test(start_paused = true)]
async fn terminal_aggregate_cancels_the_waiter() {
    let root = TempDir::new().unwrap();
    let mut rig = remediated_rig(&root).await;

    rig.pump_until(|e| matches!(e, Event::VerificationStarted { .. }))
        .await;
    assert!(rig
        .runtime
        .has_verify_waiter(&rig.sole_corruption_id()));

    // Operator gives up on the aggregate
    let id = CorruptionId::new(rig.sole_corruption_id());
    rig.deliver(Event::CorruptionIgnored { id }).await;

    assert!(!rig.runtime.has_verify_waiter(&rig.sole_corruption_id()));
    rig.assert_quiet().await;
}
