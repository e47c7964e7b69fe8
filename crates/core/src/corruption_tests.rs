// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event::{Event, StoredEvent};
use crate::health::CorruptionKind;
use crate::id::{CorruptionId, InstanceId, ScanPathId};
use std::path::PathBuf;
use yare::parameterized;

fn cid() -> CorruptionId {
    CorruptionId::new("c-1")
}

fn detected(id: u64, at_ms: u64) -> StoredEvent {
    StoredEvent {
        id,
        created_at_ms: at_ms,
        event: Event::CorruptionDetected {
            id: cid(),
            file_path: PathBuf::from("/media/movies/a.mkv"),
            scan_path_id: ScanPathId::new("movies"),
            corruption_type: CorruptionKind::VideoStream,
            detail: "decode error".to_string(),
        },
    }
}

fn stored(id: u64, at_ms: u64, event: Event) -> StoredEvent {
    StoredEvent {
        id,
        created_at_ms: at_ms,
        event,
    }
}

#[test]
fn fold_of_empty_slice_is_none() {
    assert!(CorruptionStatus::fold(&[]).is_none());
}

#[test]
fn fold_requires_detection_first() {
    let events = vec![stored(1, 10, Event::DeletionStarted { id: cid() })];
    assert!(CorruptionStatus::fold(&events).is_none());
}

#[test]
fn fold_of_single_detection() {
    let status = CorruptionStatus::fold(&[detected(1, 10)]).unwrap();
    assert_eq!(status.state, CorruptionEventKind::CorruptionDetected);
    assert_eq!(status.retry_count, 0);
    assert_eq!(status.detected_at_ms, 10);
    assert_eq!(status.last_updated_ms, 10);
    assert_eq!(status.corruption_type, CorruptionKind::VideoStream);
    assert!(!status.is_terminal());
    assert_eq!(status.state_class(), StateClass::Active);
}

#[test]
fn fold_tracks_state_retries_and_last_error() {
    let events = vec![
        detected(1, 10),
        stored(
            2,
            20,
            Event::RemediationFailed {
                id: cid(),
                error: "timeout".to_string(),
            },
        ),
        stored(
            3,
            30,
            Event::RemediationStarted {
                id: cid(),
                item_id: 42,
                file_id: 7,
                instance_id: InstanceId::new("radarr"),
            },
        ),
        stored(
            4,
            40,
            Event::SearchFailed {
                id: cid(),
                error: "no indexer".to_string(),
            },
        ),
    ];
    let status = CorruptionStatus::fold(&events).unwrap();
    assert_eq!(status.state, CorruptionEventKind::SearchFailed);
    assert_eq!(status.retry_count, 2);
    assert_eq!(status.last_error.as_deref(), Some("no indexer"));
    assert_eq!(status.item_id, Some(42));
    assert_eq!(status.file_id, Some(7));
    assert_eq!(status.instance_id, Some(InstanceId::new("radarr")));
    assert_eq!(status.detected_at_ms, 10);
    assert_eq!(status.last_updated_ms, 40);
}

#[test]
fn fold_records_replacement_path_when_it_differs() {
    let events = vec![
        detected(1, 10),
        stored(
            2,
            20,
            Event::FileDetected {
                id: cid(),
                file_path: PathBuf::from("/media/movies/a [new].mkv"),
            },
        ),
    ];
    let status = CorruptionStatus::fold(&events).unwrap();
    assert_eq!(
        status.replacement_path,
        Some(PathBuf::from("/media/movies/a [new].mkv"))
    );
}

#[test]
fn fold_ignores_same_path_file_detected() {
    let events = vec![
        detected(1, 10),
        stored(
            2,
            20,
            Event::FileDetected {
                id: cid(),
                file_path: PathBuf::from("/media/movies/a.mkv"),
            },
        ),
    ];
    let status = CorruptionStatus::fold(&events).unwrap();
    assert_eq!(status.replacement_path, None);
}

#[parameterized(
    success = { Event::VerificationSuccess { id: CorruptionId::new("c-1") }, StateClass::Resolved },
    max_retries = { Event::MaxRetriesReached { id: CorruptionId::new("c-1"), retry_count: 3 }, StateClass::Orphaned },
    ignored = { Event::CorruptionIgnored { id: CorruptionId::new("c-1") }, StateClass::Ignored },
    blocked = { Event::ImportBlocked { id: CorruptionId::new("c-1"), reason: "missing".into() }, StateClass::ManualIntervention },
    removed = { Event::ManuallyRemoved { id: CorruptionId::new("c-1") }, StateClass::ManualIntervention },
)]
fn terminal_events_classify(event: Event, expected: StateClass) {
    let events = vec![detected(1, 10), stored(2, 20, event)];
    let status = CorruptionStatus::fold(&events).unwrap();
    assert!(status.is_terminal());
    assert_eq!(status.state_class(), expected);
}

#[test]
fn failure_kinds_are_the_explicit_list() {
    for kind in FAILURE_KINDS {
        assert!(kind.is_failure());
    }
    assert!(!CorruptionEventKind::ImportBlocked.is_failure());
    assert!(!CorruptionEventKind::MaxRetriesReached.is_failure());
    assert!(!CorruptionEventKind::CorruptionDetected.is_failure());
}

#[test]
fn transition_rules() {
    use CorruptionEventKind::*;

    // Fresh aggregate: only detection
    assert!(CorruptionDetected.may_follow(None));
    assert!(!RemediationStarted.may_follow(None));

    // Detection never repeats
    assert!(!CorruptionDetected.may_follow(Some(CorruptionDetected)));

    // Terminal accepts nothing
    for terminal in [
        VerificationSuccess,
        MaxRetriesReached,
        CorruptionIgnored,
        ImportBlocked,
        ManuallyRemoved,
    ] {
        assert!(terminal.is_terminal());
        assert!(!RemediationStarted.may_follow(Some(terminal)));
        assert!(!CorruptionIgnored.may_follow(Some(terminal)));
    }

    // Normal forward progress
    assert!(RemediationStarted.may_follow(Some(CorruptionDetected)));
    assert!(VerificationSuccess.may_follow(Some(VerificationStarted)));
    assert!(CorruptionIgnored.may_follow(Some(RemediationFailed)));
}

#[test]
fn in_progress_kinds_match_the_view_contract() {
    use CorruptionEventKind::*;
    let expected = [
        RemediationStarted,
        DeletionStarted,
        DeletionCompleted,
        SearchStarted,
        SearchCompleted,
        FileDetected,
        DownloadQueued,
        DownloadProgress,
        ImportStarted,
        VerificationStarted,
    ];
    for kind in expected {
        assert!(kind.is_in_progress(), "{kind} should be in progress");
    }
    assert!(!CorruptionDetected.is_in_progress());
    assert!(!RemediationFailed.is_in_progress());
    assert!(!VerificationSuccess.is_in_progress());
}

#[test]
fn awaits_verification_covers_post_search_states() {
    use CorruptionEventKind::*;
    assert!(SearchCompleted.awaits_verification());
    assert!(DownloadProgress.awaits_verification());
    assert!(VerificationStarted.awaits_verification());
    assert!(!SearchStarted.awaits_verification());
    assert!(!VerificationSuccess.awaits_verification());
}
