// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mendarr_core::{ScanFileStatus, ScanStatus};

fn queued(scan: u64) -> Event {
    Event::ScanQueued {
        scan_id: ScanId(scan),
        scan_path_id: ScanPathId::new("movies"),
        root: PathBuf::from("/mnt/media/movies"),
    }
}

fn file_recorded(scan: u64, name: &str, status: ScanFileStatus) -> Event {
    Event::ScanFileRecorded {
        scan_id: ScanId(scan),
        file_path: PathBuf::from("/mnt/media/movies").join(name),
        status,
        size: 1000,
        modified_ms: 5,
    }
}

#[test]
fn scan_queued_creates_record_and_advances_counter() {
    let mut state = MaterializedState::default();
    state.apply(1, 10, &queued(1));

    let scan = &state.scans[&1];
    assert_eq!(scan.status, ScanStatus::Queued);
    assert_eq!(scan.queued_at_ms, 10);
    assert_eq!(state.peek_next_scan_id(), 2);
}

#[test]
fn scan_started_promotes_to_running_once() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            queued(1),
            Event::ScanStarted {
                scan_id: ScanId(1),
                resumed: false,
            },
        ],
    );

    let scan = &state.scans[&1];
    assert_eq!(scan.status, ScanStatus::Running);
    let started = scan.started_at_ms;
    assert!(started.is_some());

    // A resume keeps the original start time
    let mut state2 = state.clone();
    state2.apply(
        3,
        999,
        &Event::ScanStarted {
            scan_id: ScanId(1),
            resumed: true,
        },
    );
    assert_eq!(state2.scans[&1].started_at_ms, started);
}

#[test]
fn file_records_drive_counters() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            queued(1),
            file_recorded(1, "a.mkv", ScanFileStatus::Healthy),
            file_recorded(1, "b.mkv", ScanFileStatus::Corrupt),
            file_recorded(1, "c.mkv", ScanFileStatus::Inaccessible),
        ],
    );

    let scan = &state.scans[&1];
    assert_eq!(scan.files_seen, 3);
    assert_eq!(scan.files_scanned, 2, "inaccessible files are not scanned");
    assert_eq!(scan.corruptions_found, 1);
    assert_eq!(state.scan_files[&1].len(), 3);
}

#[test]
fn reapplying_a_file_record_does_not_double_count() {
    let mut state = MaterializedState::default();
    state.apply(1, 10, &queued(1));
    let record = file_recorded(1, "a.mkv", ScanFileStatus::Healthy);
    state.apply(2, 20, &record);
    state.apply(2, 20, &record);

    let scan = &state.scans[&1];
    assert_eq!(scan.files_seen, 1);
    assert_eq!(scan.files_scanned, 1);
}

#[test]
fn inaccessible_file_becoming_healthy_counts_as_scanned() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            queued(1),
            file_recorded(1, "a.mkv", ScanFileStatus::Inaccessible),
            file_recorded(1, "a.mkv", ScanFileStatus::Healthy),
        ],
    );

    let scan = &state.scans[&1];
    assert_eq!(scan.files_seen, 1);
    assert_eq!(scan.files_scanned, 1);
}

#[test]
fn progress_counters_never_decrease() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            queued(1),
            Event::ScanProgress {
                scan_id: ScanId(1),
                files_seen: 50,
                files_scanned: 42,
                corruptions_found: 2,
            },
            Event::ScanProgress {
                scan_id: ScanId(1),
                files_seen: 40,
                files_scanned: 30,
                corruptions_found: 1,
            },
        ],
    );

    let scan = &state.scans[&1];
    assert_eq!(scan.files_seen, 50);
    assert_eq!(scan.files_scanned, 42);
    assert_eq!(scan.corruptions_found, 2);
}

#[test]
fn completion_is_terminal_for_the_scan() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            queued(1),
            Event::ScanStarted {
                scan_id: ScanId(1),
                resumed: false,
            },
            Event::ScanCompleted {
                scan_id: ScanId(1),
                files_scanned: 100,
                corruptions_found: 2,
            },
            // A late cancel must not override completion
            Event::ScanCancelled { scan_id: ScanId(1) },
        ],
    );

    let scan = &state.scans[&1];
    assert_eq!(scan.status, ScanStatus::Completed);
    assert_eq!(scan.files_scanned, 100);
    assert!(scan.completed_at_ms.is_some());
}

#[test]
fn cancel_request_flags_then_cancelled_lands() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            queued(1),
            Event::ScanStarted {
                scan_id: ScanId(1),
                resumed: false,
            },
            Event::ScanCancelRequested { scan_id: ScanId(1) },
        ],
    );
    assert!(state.scans[&1].cancelling);
    assert_eq!(state.scans[&1].status, ScanStatus::Running);

    state.apply(4, 40, &Event::ScanCancelled { scan_id: ScanId(1) });
    let scan = &state.scans[&1];
    assert_eq!(scan.status, ScanStatus::Cancelled);
    assert!(!scan.cancelling);
}

#[test]
fn pause_only_applies_to_live_scans() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            queued(1),
            Event::ScanStarted {
                scan_id: ScanId(1),
                resumed: false,
            },
            Event::ScanPaused { scan_id: ScanId(1) },
        ],
    );
    assert_eq!(state.scans[&1].status, ScanStatus::Paused);

    state.apply(
        4,
        40,
        &Event::ScanCompleted {
            scan_id: ScanId(1),
            files_scanned: 1,
            corruptions_found: 0,
        },
    );
    state.apply(5, 50, &Event::ScanPaused { scan_id: ScanId(1) });
    assert_eq!(state.scans[&1].status, ScanStatus::Completed);
}

#[test]
fn scan_failed_records_the_error() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            queued(1),
            Event::ScanFailed {
                scan_id: ScanId(1),
                error: "root unreadable".to_string(),
            },
        ],
    );

    let scan = &state.scans[&1];
    assert_eq!(scan.status, ScanStatus::Error);
    assert_eq!(scan.error.as_deref(), Some("root unreadable"));
}

#[test]
fn next_scan_id_is_replay_stable() {
    let mut state = MaterializedState::default();
    apply_all(&mut state, 1, &[queued(3), queued(7)]);
    assert_eq!(state.peek_next_scan_id(), 8);

    // Replaying the same events yields the same assignment point
    let mut replayed = MaterializedState::default();
    apply_all(&mut replayed, 1, &[queued(3), queued(7)]);
    assert_eq!(replayed.peek_next_scan_id(), 8);
}
