// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mendarr_core::CorruptionId;
use tempfile::TempDir;

fn event(n: u32) -> Event {
    Event::SearchStarted {
        id: CorruptionId::new(format!("c-{n}")),
    }
}

fn open_bus(dir: &TempDir) -> (EventBus, EventReader) {
    let wal = Wal::open(&dir.path().join("wal/events.wal"), 0).unwrap();
    EventBus::new(wal)
}

#[tokio::test]
async fn publish_assigns_increasing_ids() {
    let dir = TempDir::new().unwrap();
    let (bus, _reader) = open_bus(&dir);

    assert_eq!(bus.publish(event(1)).unwrap(), 1);
    assert_eq!(bus.publish(event(2)).unwrap(), 2);
}

#[tokio::test]
async fn reader_sees_published_events_in_order() {
    let dir = TempDir::new().unwrap();
    let (bus, mut reader) = open_bus(&dir);

    bus.publish(event(1)).unwrap();
    bus.publish(event(2)).unwrap();

    let first = reader.recv().await.unwrap().unwrap();
    assert_eq!(first.seq, 1);
    assert_eq!(first.event, event(1));
    reader.mark_processed(first.seq);

    let second = reader.recv().await.unwrap().unwrap();
    assert_eq!(second.seq, 2);
    reader.mark_processed(second.seq);
    assert_eq!(bus.processed_seq(), 2);
}

#[tokio::test]
async fn recv_returns_none_when_publishers_are_gone() {
    let dir = TempDir::new().unwrap();
    let (bus, mut reader) = open_bus(&dir);

    drop(bus);
    let next = reader.recv().await.unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn concurrent_publishers_get_a_total_order_with_no_lost_writes() {
    let dir = TempDir::new().unwrap();
    let (bus, mut reader) = open_bus(&dir);

    let mut handles = Vec::new();
    for worker in 0..8u32 {
        let bus = bus.clone();
        handles.push(tokio::spawn(async move {
            let mut seqs = Vec::new();
            for n in 0..25u32 {
                seqs.push(bus.publish(event(worker * 100 + n)).unwrap());
            }
            seqs
        }));
    }

    let mut all_seqs = Vec::new();
    for handle in handles {
        all_seqs.extend(handle.await.unwrap());
    }
    all_seqs.sort_unstable();
    let expected: Vec<u64> = (1..=200).collect();
    assert_eq!(all_seqs, expected, "gap-free, duplicate-free total order");

    // The reader observes every entry exactly once, in order
    let mut seen = 0;
    while let Some(entry) = reader.recv().await.unwrap() {
        seen += 1;
        assert_eq!(entry.seq, seen);
        reader.mark_processed(entry.seq);
        if seen == 200 {
            break;
        }
    }
}

#[tokio::test]
async fn events_survive_reopen_after_flush() {
    let dir = TempDir::new().unwrap();
    {
        let (bus, _reader) = open_bus(&dir);
        bus.publish(event(1)).unwrap();
        bus.flush().unwrap();
    }

    let (_bus, mut reader) = open_bus(&dir);
    let entry = reader.recv().await.unwrap().unwrap();
    assert_eq!(entry.seq, 1);
    assert!(entry.created_at_ms > 0);
}
