// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn rescan_queued(path: &str, attempts: u32) -> Event {
    Event::RescanQueued {
        file_path: PathBuf::from(path),
        scan_path_id: ScanPathId::new("movies"),
        reason: "mount_lost".to_string(),
        attempts,
        next_retry_at_ms: 1000 * (attempts as u64 + 1),
    }
}

#[test]
fn queued_entry_lands_in_the_table() {
    let mut state = MaterializedState::default();
    state.apply(1, 10, &rescan_queued("/mnt/media/movies/b.mkv", 0));

    let entry = &state.pending_rescans["/mnt/media/movies/b.mkv"];
    assert_eq!(entry.attempts, 0);
    assert_eq!(entry.reason, "mount_lost");
    assert_eq!(entry.next_retry_at_ms, 1000);
}

#[test]
fn requeue_overwrites_with_new_attempt_count() {
    let mut state = MaterializedState::default();
    state.apply(1, 10, &rescan_queued("/mnt/media/movies/b.mkv", 0));
    state.apply(2, 20, &rescan_queued("/mnt/media/movies/b.mkv", 1));

    assert_eq!(state.pending_rescans.len(), 1);
    let entry = &state.pending_rescans["/mnt/media/movies/b.mkv"];
    assert_eq!(entry.attempts, 1);
    assert_eq!(entry.next_retry_at_ms, 2000);
}

#[test]
fn resolved_removes_the_entry() {
    let mut state = MaterializedState::default();
    state.apply(1, 10, &rescan_queued("/mnt/media/movies/b.mkv", 0));
    state.apply(
        2,
        20,
        &Event::RescanResolved {
            file_path: PathBuf::from("/mnt/media/movies/b.mkv"),
        },
    );

    assert!(state.pending_rescans.is_empty());
}

#[test]
fn resolved_for_unknown_path_is_a_noop() {
    let mut state = MaterializedState::default();
    state.apply(
        1,
        10,
        &Event::RescanResolved {
            file_path: PathBuf::from("/mnt/media/movies/nope.mkv"),
        },
    );
    assert!(state.pending_rescans.is_empty());
}
