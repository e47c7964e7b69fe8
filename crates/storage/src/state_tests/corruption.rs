// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mendarr_core::CorruptionEventKind;

#[test]
fn detection_creates_the_aggregate() {
    let mut state = MaterializedState::default();
    state.apply(1, 10, &detection("c-1"));

    let events = state.read_aggregate("c-1");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, 1);
    assert_eq!(events[0].created_at_ms, 10);
    assert_eq!(
        state.corruption_state("c-1"),
        Some(CorruptionEventKind::CorruptionDetected)
    );
}

#[test]
fn aggregate_event_ids_are_strictly_increasing() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            detection("c-1"),
            Event::RemediationStarted {
                id: CorruptionId::new("c-1"),
                item_id: 1,
                file_id: 2,
                instance_id: InstanceId::new("radarr"),
            },
            Event::DeletionStarted {
                id: CorruptionId::new("c-1"),
            },
        ],
    );

    let ids: Vec<u64> = state.read_aggregate("c-1").iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn reapplying_the_same_entry_is_a_noop() {
    let mut state = MaterializedState::default();
    state.apply(1, 10, &detection("c-1"));
    state.apply(1, 10, &detection("c-1"));

    assert_eq!(state.read_aggregate("c-1").len(), 1);
}

#[test]
fn first_event_must_be_a_detection() {
    let mut state = MaterializedState::default();
    state.apply(
        1,
        10,
        &Event::DeletionStarted {
            id: CorruptionId::new("c-1"),
        },
    );

    assert!(state.read_aggregate("c-1").is_empty());
    assert!(!state.corruptions.contains_key("c-1"));
}

#[test]
fn detection_never_repeats_within_an_aggregate() {
    let mut state = MaterializedState::default();
    state.apply(1, 10, &detection("c-1"));
    state.apply(2, 20, &detection("c-1"));

    assert_eq!(state.read_aggregate("c-1").len(), 1);
}

#[test]
fn terminal_aggregates_reject_further_events() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            detection("c-1"),
            Event::CorruptionIgnored {
                id: CorruptionId::new("c-1"),
            },
        ],
    );
    assert!(state.corruption_is_terminal("c-1"));

    state.apply(
        3,
        30,
        &Event::RemediationStarted {
            id: CorruptionId::new("c-1"),
            item_id: 1,
            file_id: 2,
            instance_id: InstanceId::new("radarr"),
        },
    );
    state.apply(
        4,
        40,
        &Event::ManuallyRemoved {
            id: CorruptionId::new("c-1"),
        },
    );

    assert_eq!(state.read_aggregate("c-1").len(), 2);
    assert_eq!(
        state.corruption_state("c-1"),
        Some(CorruptionEventKind::CorruptionIgnored)
    );
}

#[test]
fn replay_from_scratch_matches_incremental_view() {
    let events = vec![
        detection("c-1"),
        Event::RemediationStarted {
            id: CorruptionId::new("c-1"),
            item_id: 9,
            file_id: 3,
            instance_id: InstanceId::new("radarr"),
        },
        Event::SearchFailed {
            id: CorruptionId::new("c-1"),
            error: "indexer down".to_string(),
        },
        Event::SearchStarted {
            id: CorruptionId::new("c-1"),
        },
        Event::SearchCompleted {
            id: CorruptionId::new("c-1"),
        },
    ];

    let mut incremental = MaterializedState::default();
    apply_all(&mut incremental, 1, &events);
    let incremental_status = incremental.corruption_status("c-1").unwrap();

    let mut replayed = MaterializedState::default();
    apply_all(&mut replayed, 1, &events);
    let replayed_status = replayed.corruption_status("c-1").unwrap();

    assert_eq!(incremental_status, replayed_status);
    assert_eq!(incremental_status.retry_count, 1);
    assert_eq!(
        incremental_status.state,
        CorruptionEventKind::SearchCompleted
    );
}

#[test]
fn separate_aggregates_are_independent() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            detection("c-1"),
            detection("c-2"),
            Event::VerificationSuccess {
                id: CorruptionId::new("c-1"),
            },
        ],
    );

    assert!(state.corruption_is_terminal("c-1"));
    assert!(!state.corruption_is_terminal("c-2"));
}
