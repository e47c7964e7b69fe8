// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mendarr_core::{CorruptionId, CorruptionKind, Event, ScanPathId};
use std::path::PathBuf;
use tempfile::TempDir;

fn state_with_one_corruption() -> MaterializedState {
    let mut state = MaterializedState::default();
    state.apply(
        1,
        10,
        &Event::CorruptionDetected {
            id: CorruptionId::new("c-1"),
            file_path: PathBuf::from("/media/a.mkv"),
            scan_path_id: ScanPathId::new("movies"),
            corruption_type: CorruptionKind::Truncated,
            detail: "short".to_string(),
        },
    );
    state
}

#[test]
fn save_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    let snapshot = Snapshot::new(42, state_with_one_corruption());
    snapshot.save(&path).unwrap();

    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 42);
    assert_eq!(loaded.version, CURRENT_SNAPSHOT_VERSION);
    assert_eq!(loaded.state.read_aggregate("c-1").len(), 1);
}

#[test]
fn load_missing_returns_none() {
    let dir = TempDir::new().unwrap();
    let loaded = Snapshot::load(&dir.path().join("missing.json")).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn corrupt_snapshot_is_moved_to_bak() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, b"{not json").unwrap();

    let loaded = Snapshot::load(&path).unwrap();
    assert!(loaded.is_none());
    assert!(!path.exists());
    assert!(path.with_extension("bak").exists());
}

#[test]
fn save_is_atomic_no_tmp_left_behind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    Snapshot::new(1, MaterializedState::default())
        .save(&path)
        .unwrap();
    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn bak_rotation_keeps_three() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    for n in 0..5 {
        std::fs::write(&path, format!("corrupt {n}")).unwrap();
        let _ = Snapshot::load(&path).unwrap();
    }

    assert!(path.with_extension("bak").exists());
    assert!(path.with_extension("bak.2").exists());
    assert!(path.with_extension("bak.3").exists());
    assert!(!path.with_extension("bak.4").exists());

    // Most recent corruption is in .bak
    let latest = std::fs::read_to_string(path.with_extension("bak")).unwrap();
    assert_eq!(latest, "corrupt 4");
}
