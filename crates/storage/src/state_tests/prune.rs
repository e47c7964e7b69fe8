// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mendarr_core::ScanFileStatus;

#[test]
fn prune_removes_stale_corruption_aggregates() {
    let mut state = MaterializedState::default();
    // apply_all stamps created_at = seq * 10
    apply_all(&mut state, 1, &[detection("c-old")]);
    apply_all(&mut state, 100, &[detection("c-new")]);

    let report = state.prune(500);
    assert_eq!(report.corruptions_removed, 1);
    assert!(state.corruptions.contains_key("c-new"));
    assert!(!state.corruptions.contains_key("c-old"));
}

#[test]
fn aggregate_with_recent_activity_survives() {
    let mut state = MaterializedState::default();
    state.apply(1, 10, &detection("c-1"));
    state.apply(
        100,
        1000,
        &Event::SearchStarted {
            id: CorruptionId::new("c-1"),
        },
    );

    // The first event is old but the aggregate's latest event is not
    let report = state.prune(500);
    assert_eq!(report.corruptions_removed, 0);
    assert_eq!(state.read_aggregate("c-1").len(), 2);
}

#[test]
fn prune_removes_old_terminal_scans_and_their_files() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            Event::ScanQueued {
                scan_id: ScanId(1),
                scan_path_id: ScanPathId::new("movies"),
                root: PathBuf::from("/mnt/media/movies"),
            },
            Event::ScanFileRecorded {
                scan_id: ScanId(1),
                file_path: PathBuf::from("/mnt/media/movies/a.mkv"),
                status: ScanFileStatus::Healthy,
                size: 1,
                modified_ms: 1,
            },
            Event::ScanCompleted {
                scan_id: ScanId(1),
                files_scanned: 1,
                corruptions_found: 0,
            },
        ],
    );

    let report = state.prune(10_000);
    assert_eq!(report.scans_removed, 1);
    assert_eq!(report.scan_file_rows_removed, 1);
    assert!(state.scans.is_empty());
    assert!(state.scan_files.is_empty());
}

#[test]
fn running_scans_survive_pruning() {
    let mut state = MaterializedState::default();
    apply_all(
        &mut state,
        1,
        &[
            Event::ScanQueued {
                scan_id: ScanId(1),
                scan_path_id: ScanPathId::new("movies"),
                root: PathBuf::from("/mnt/media/movies"),
            },
            Event::ScanStarted {
                scan_id: ScanId(1),
                resumed: false,
            },
        ],
    );

    let report = state.prune(10_000);
    assert_eq!(report.scans_removed, 0);
    assert!(state.scans.contains_key(&1));
}

#[test]
fn orphaned_scan_file_tables_are_swept() {
    let mut state = MaterializedState::default();
    state.scan_files.insert(
        99,
        std::collections::HashMap::from([(
            "/mnt/media/x.mkv".to_string(),
            mendarr_core::ScanFile {
                path: PathBuf::from("/mnt/media/x.mkv"),
                status: ScanFileStatus::Healthy,
                size: 1,
                modified_ms: 1,
                checked_at_ms: 1,
            },
        )]),
    );

    let report = state.prune(0);
    assert_eq!(report.scan_file_rows_removed, 1);
    assert!(state.scan_files.is_empty());
}

#[test]
fn empty_prune_reports_empty() {
    let mut state = MaterializedState::default();
    assert!(state.prune(1_000_000).is_empty());
}
