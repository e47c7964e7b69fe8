// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detection → remediation flows.

use super::*;
use mendarr_adapters::{FakeCall, FakeOp};

#[tokio::test(start_paused = true)]
async fn detection_drives_delete_then_search() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.arr.add_item("/movies/a.mkv", item(42, 7));

    rig.deliver(detection_for("/mnt/media/movies/a.mkv")).await;
    rig.pump_until(|e| matches!(e, Event::SearchCompleted { .. }))
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
        ]
    );

    // The manager saw lookup (translated path), delete, then search
    let calls = rig.arr.calls();
    assert_eq!(
        calls,
        vec![
            FakeCall::Lookup("/movies/a.mkv".into()),
            FakeCall::DeleteFile(7),
            FakeCall::SearchItem(42),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn dry_run_path_stops_at_detection() {
    let mut rig = TestRig::new();
    let mut path = TestRig::movies_path("/mnt/media/movies");
    path.dry_run = true;
    rig.seed(Event::ScanPathConfigured { config: path });
    rig.seed(Event::ArrInstanceConfigured {
        instance: TestRig::radarr(),
    });

    rig.deliver(detection_for("/mnt/media/movies/d.mkv")).await;
    rig.assert_quiet().await;

    use CorruptionEventKind::*;
    assert_eq!(rig.aggregate_kinds("c-1"), vec![CorruptionDetected]);
    assert!(rig.arr.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn manual_path_stops_at_detection() {
    let mut rig = TestRig::new();
    let mut path = TestRig::movies_path("/mnt/media/movies");
    path.auto_remediate = false;
    rig.seed(Event::ScanPathConfigured { config: path });

    rig.deliver(detection_for("/mnt/media/movies/d.mkv")).await;
    rig.assert_quiet().await;
    assert!(rig.arr.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn global_dry_run_overrides_path_policy() {
    let mut rig = TestRig::with_config(RuntimeConfig {
        global_dry_run: true,
        ..RuntimeConfig::default()
    });
    rig.seed(Event::ScanPathConfigured {
        config: TestRig::movies_path("/mnt/media/movies"),
    });
    rig.seed(Event::ArrInstanceConfigured {
        instance: TestRig::radarr(),
    });

    rig.deliver(detection_for("/mnt/media/movies/a.mkv")).await;
    rig.assert_quiet().await;
    assert!(rig.arr.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_item_blocks_import() {
    let mut rig = seeded_rig("/mnt/media/movies");
    // No item seeded: lookup yields NotFound

    rig.deliver(detection_for("/mnt/media/movies/gone.mkv")).await;
    rig.pump_until(|e| matches!(e, Event::ImportBlocked { .. }))
        .await;

    use CorruptionEventKind::*;
    assert_eq!(
        rig.aggregate_kinds("c-1"),
        vec![CorruptionDetected, ImportBlocked]
    );
    assert!(rig.state.lock().corruption_is_terminal("c-1"));
}

#[tokio::test(start_paused = true)]
async fn transient_lookup_failure_counts_a_retry() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.arr.add_item("/movies/a.mkv", item(42, 7));
    rig.arr.fail_next(FakeOp::Lookup, transient());

    rig.deliver(detection_for("/mnt/media/movies/a.mkv")).await;
    rig.pump_until(|e| matches!(e, Event::RemediationFailed { .. }))
        .await;

    let status = rig.state.lock().corruption_status("c-1").unwrap();
    assert_eq!(status.retry_count, 1);
    assert!(!status.is_terminal());
    // Lookup failed before anything destructive
    assert!(!rig
        .arr
        .calls()
        .iter()
        .any(|c| matches!(c, FakeCall::DeleteFile(_))));
}

#[tokio::test(start_paused = true)]
async fn deletion_failure_stops_before_search() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.arr.add_item("/movies/a.mkv", item(42, 7));
    rig.arr.fail_next(FakeOp::DeleteFile, transient());

    rig.deliver(detection_for("/mnt/media/movies/a.mkv")).await;
    rig.pump_until(|e| matches!(e, Event::DeletionFailed { .. }))
        .await;

    use CorruptionEventKind::*;
    assert_eq!(
        rig.aggregate_kinds("c-1"),
        vec![
            CorruptionDetected,
            RemediationStarted,
            DeletionStarted,
            DeletionFailed,
        ]
    );
    assert!(!rig
        .arr
        .calls()
        .iter()
        .any(|c| matches!(c, FakeCall::SearchItem(_))));
}

#[tokio::test(start_paused = true)]
async fn deletion_of_missing_file_counts_as_completed() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.arr.add_item("/movies/a.mkv", item(42, 7));
    rig.arr.fail_next(FakeOp::DeleteFile, ArrError::NotFound);

    rig.deliver(detection_for("/mnt/media/movies/a.mkv")).await;
    let seen = rig
        .pump_until(|e| matches!(e, Event::SearchCompleted { .. }))
        .await;

    assert!(seen
        .iter()
        .any(|e| matches!(e, Event::DeletionCompleted { .. })));
}

#[tokio::test(start_paused = true)]
async fn search_failure_emits_search_failed() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.arr.add_item("/movies/a.mkv", item(42, 7));
    rig.arr.fail_next(FakeOp::SearchItem, transient());

    rig.deliver(detection_for("/mnt/media/movies/a.mkv")).await;
    rig.pump_until(|e| matches!(e, Event::SearchFailed { .. }))
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
            SearchFailed,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn duplicate_detection_is_not_redispatched_while_in_flight() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.arr.add_item("/movies/a.mkv", item(42, 7));

    rig.deliver(detection_for("/mnt/media/movies/a.mkv")).await;
    rig.pump_until(|e| matches!(e, Event::SearchCompleted { .. }))
        .await;

    // Exactly one remediation ran
    let deletes = rig
        .arr
        .calls()
        .into_iter()
        .filter(|c| matches!(c, FakeCall::DeleteFile(_)))
        .count();
    assert_eq!(deletes, 1);
}
