// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry ceilings, stall handling, operator commands and terminal
//! rejection.

use super::*;
use mendarr_adapters::{FakeCall, FakeOp};

#[tokio::test(start_paused = true)]
async fn third_failure_hits_the_ceiling() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.arr.add_item("/movies/c.mkv", item(42, 7));
    for _ in 0..3 {
        rig.arr.fail_next(FakeOp::Lookup, transient());
    }

    rig.deliver(detection_for("/mnt/media/movies/c.mkv")).await;
    rig.pump_until(|e| matches!(e, Event::RemediationFailed { .. }))
        .await;

    // Monitor re-prompts the stalled aggregate twice more
    for _ in 0..2 {
        rig.clock.advance(Duration::from_secs(31 * 60));
        let events = rig.runtime.monitor_tick();
        for event in events {
            rig.deliver(event).await;
        }
        rig.pump_until(|e| matches!(e, Event::RemediationFailed { .. }))
            .await;
    }
    // The third failure tripped the ceiling
    rig.pump_until(|e| matches!(e, Event::MaxRetriesReached { .. }))
        .await;

    let status = rig.state.lock().corruption_status("c-1").unwrap();
    assert_eq!(status.retry_count, 3);
    assert_eq!(status.state, CorruptionEventKind::MaxRetriesReached);
    assert_eq!(rig.state.lock().dashboard_stats().orphaned_corruptions, 1);
}

#[tokio::test(start_paused = true)]
async fn terminal_aggregate_accepts_no_further_events() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.seed(detection_for("/mnt/media/movies/c.mkv"));
    rig.seed(Event::MaxRetriesReached {
        id: CorruptionId::new("c-1"),
        retry_count: 3,
    });

    rig.deliver(Event::SearchCompleted {
        id: CorruptionId::new("c-1"),
    })
    .await;
    rig.assert_quiet().await;

    use CorruptionEventKind::*;
    assert_eq!(
        rig.aggregate_kinds("c-1"),
        vec![CorruptionDetected, MaxRetriesReached]
    );
    // No verification waiter was armed for the rejected event
    assert!(!rig.runtime.has_verify_waiter("c-1"));
}

#[tokio::test(start_paused = true)]
async fn stalled_aggregate_with_retries_left_is_reprompted() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.arr.add_item("/movies/a.mkv", item(42, 7));

    // An hour-old failed remediation attempt
    rig.seed_at(1_000, detection_for("/mnt/media/movies/a.mkv"));
    rig.seed_at(
        2_000,
        Event::RemediationFailed {
            id: CorruptionId::new("c-1"),
            error: "502".to_string(),
        },
    );
    rig.clock.set_epoch_ms(2_000 + 60 * 60 * 1000);

    let events = rig.runtime.monitor_tick();
    assert!(events.is_empty(), "re-prompt spawns a task, no events");
    rig.pump_until(|e| matches!(e, Event::SearchCompleted { .. }))
        .await;
}

#[tokio::test(start_paused = true)]
async fn stalled_mid_remediation_resumes_at_search_not_delete() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.arr.add_item("/movies/a.mkv", item(42, 7));

    rig.seed_at(1_000, detection_for("/mnt/media/movies/a.mkv"));
    rig.seed_at(
        2_000,
        Event::RemediationStarted {
            id: CorruptionId::new("c-1"),
            item_id: 42,
            file_id: 7,
            instance_id: InstanceId::new("radarr"),
        },
    );
    rig.seed_at(
        3_000,
        Event::SearchFailed {
            id: CorruptionId::new("c-1"),
            error: "indexer down".to_string(),
        },
    );
    rig.clock.set_epoch_ms(3_000 + 60 * 60 * 1000);

    let events = rig.runtime.monitor_tick();
    assert!(events.is_empty());
    rig.pump_until(|e| matches!(e, Event::SearchCompleted { .. }))
        .await;

    // The destructive delete never ran a second time
    assert!(!rig
        .arr
        .calls()
        .iter()
        .any(|c| matches!(c, FakeCall::DeleteFile(_))));
}

#[tokio::test(start_paused = true)]
async fn stalled_verification_waiter_is_rearmed() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.seed_at(1_000, detection_for("/mnt/media/movies/a.mkv"));
    rig.seed_at(
        2_000,
        Event::RemediationStarted {
            id: CorruptionId::new("c-1"),
            item_id: 42,
            file_id: 7,
            instance_id: InstanceId::new("radarr"),
        },
    );
    rig.seed_at(
        3_000,
        Event::SearchCompleted {
            id: CorruptionId::new("c-1"),
        },
    );
    rig.clock.set_epoch_ms(3_000 + 60 * 60 * 1000);

    assert!(!rig.runtime.has_verify_waiter("c-1"));
    let events = rig.runtime.monitor_tick();
    assert!(events.is_empty());
    assert!(rig.runtime.has_verify_waiter("c-1"));
}

#[tokio::test(start_paused = true)]
async fn stall_threshold_spares_recent_aggregates() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.seed(detection_for("/mnt/media/movies/a.mkv"));

    // Fresh aggregate: well inside the stall threshold
    let events = rig.runtime.monitor_tick();
    assert!(events.is_empty());
    assert!(rig.runtime.verify_tasks.lock().is_empty());
    assert!(rig.runtime.remediations.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn operator_ignore_is_terminal() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.seed(detection_for("/mnt/media/movies/a.mkv"));

    rig.runtime.ignore_corruption(&CorruptionId::new("c-1")).await;
    let event = rig.pump().await.unwrap();
    assert!(matches!(event, Event::CorruptionIgnored { .. }));

    assert!(rig.state.lock().corruption_is_terminal("c-1"));
    // Ignored aggregates vanish from the dashboard entirely
    let stats = rig.state.lock().dashboard_stats();
    assert_eq!(stats.total_corruptions, 0);
}

#[tokio::test(start_paused = true)]
async fn operator_manual_removal_is_terminal_and_counted() {
    let mut rig = seeded_rig("/mnt/media/movies");
    rig.seed(detection_for("/mnt/media/movies/d.mkv"));

    rig.runtime
        .mark_manually_removed(&CorruptionId::new("c-1"))
        .await;
    let event = rig.pump().await.unwrap();
    assert!(matches!(event, Event::ManuallyRemoved { .. }));

    let stats = rig.state.lock().dashboard_stats();
    assert_eq!(stats.manual_intervention_required, 1);
}
