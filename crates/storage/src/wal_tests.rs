// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mendarr_core::{CorruptionId, Event};
use std::io::Write as _;
use tempfile::TempDir;

fn event(n: u32) -> Event {
    Event::DeletionStarted {
        id: CorruptionId::new(format!("c-{n}")),
    }
}

fn wal_path(dir: &TempDir) -> PathBuf {
    dir.path().join("wal").join("events.wal")
}

#[test]
fn append_assigns_increasing_sequences() {
    let dir = TempDir::new().unwrap();
    let mut wal = Wal::open(&wal_path(&dir), 0).unwrap();

    assert_eq!(wal.append(&event(1), 10).unwrap(), 1);
    assert_eq!(wal.append(&event(2), 20).unwrap(), 2);
    assert_eq!(wal.append(&event(3), 30).unwrap(), 3);
    assert_eq!(wal.write_seq(), 3);
}

#[test]
fn flush_makes_entries_durable() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&event(1), 10).unwrap();
        wal.append(&event(2), 20).unwrap();
        wal.flush().unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[0].created_at_ms, 10);
    assert_eq!(entries[1].seq, 2);
    assert_eq!(entries[1].event, event(2));
}

#[test]
fn unflushed_entries_are_lost_without_flush() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&event(1), 10).unwrap();
        // dropped without flush
    }

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.entries_after(0).unwrap().len(), 0);
    assert_eq!(wal.write_seq(), 0);
}

#[test]
fn reopen_resumes_sequence_numbering() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&event(1), 1).unwrap();
        wal.append(&event(2), 2).unwrap();
        wal.flush().unwrap();
    }

    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.append(&event(3), 3).unwrap(), 3);
}

#[test]
fn next_unprocessed_walks_entries_in_order() {
    let dir = TempDir::new().unwrap();
    let mut wal = Wal::open(&wal_path(&dir), 0).unwrap();

    wal.append(&event(1), 1).unwrap();
    wal.append(&event(2), 2).unwrap();

    let first = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(first.seq, 1);
    wal.mark_processed(first.seq);

    let second = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(second.seq, 2);
    wal.mark_processed(second.seq);

    assert!(wal.next_unprocessed().unwrap().is_none());
    assert_eq!(wal.processed_seq(), 2);
}

#[test]
fn open_with_processed_seq_skips_processed_entries() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        for n in 1..=4 {
            wal.append(&event(n), n as u64).unwrap();
        }
        wal.flush().unwrap();
    }

    let mut wal = Wal::open(&path, 2).unwrap();
    let next = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(next.seq, 3);
}

#[test]
fn needs_flush_on_threshold() {
    let dir = TempDir::new().unwrap();
    let mut wal = Wal::open(&wal_path(&dir), 0).unwrap();

    assert!(!wal.needs_flush());
    for n in 0..100 {
        wal.append(&event(n), 0).unwrap();
    }
    assert!(wal.needs_flush());
    wal.flush().unwrap();
    assert!(!wal.needs_flush());
}

#[test]
fn corrupt_tail_is_rotated_preserving_valid_prefix() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&event(1), 1).unwrap();
        wal.append(&event(2), 2).unwrap();
        wal.flush().unwrap();
    }

    // Simulate a torn write at the tail
    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        file.write_all(b"{\"seq\":3,\"at\":3,\"event\":{\"ty").unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(wal.write_seq(), 2);

    // The corrupt original was preserved as .bak
    assert!(path.with_extension("bak").exists());
}

#[test]
fn truncate_before_drops_old_entries() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);
    let mut wal = Wal::open(&path, 0).unwrap();

    for n in 1..=5 {
        wal.append(&event(n), n as u64).unwrap();
    }
    wal.flush().unwrap();
    wal.mark_processed(5);

    wal.truncate_before(4).unwrap();

    let entries = wal.entries_after(0).unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![4, 5]);

    // New appends continue the old numbering
    assert_eq!(wal.append(&event(6), 6).unwrap(), 6);
}

#[test]
fn truncate_preserves_unprocessed_read_position() {
    let dir = TempDir::new().unwrap();
    let path = wal_path(&dir);
    let mut wal = Wal::open(&path, 0).unwrap();

    for n in 1..=4 {
        wal.append(&event(n), n as u64).unwrap();
    }
    wal.flush().unwrap();
    wal.mark_processed(2);

    wal.truncate_before(2).unwrap();

    // Entries 3 and 4 are still unprocessed and must surface in order
    let next = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(next.seq, 3);
    wal.mark_processed(3);
    let next = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(next.seq, 4);
}

#[test]
fn entries_after_filters_by_sequence() {
    let dir = TempDir::new().unwrap();
    let mut wal = Wal::open(&wal_path(&dir), 0).unwrap();

    for n in 1..=3 {
        wal.append(&event(n), n as u64).unwrap();
    }
    wal.flush().unwrap();

    let entries = wal.entries_after(1).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 2);
}
