// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::{Checkpointer, MaterializedState, Wal};
use mendarr_core::{CorruptionId, Event};
use tempfile::TempDir;

fn checkpointed_snapshot(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("snapshot.zst");
    let checkpointer = Checkpointer::new(path.clone());
    checkpointer
        .checkpoint_sync(1, &MaterializedState::default())
        .unwrap();
    path
}

#[test]
fn backup_copies_the_snapshot_byte_for_byte() {
    let dir = TempDir::new().unwrap();
    let snapshot_path = checkpointed_snapshot(&dir);
    let manager = BackupManager::new(dir.path().join("backups"), 5);

    let artifact = manager.create(&snapshot_path, 1).unwrap();
    assert_eq!(
        std::fs::read(&artifact).unwrap(),
        std::fs::read(&snapshot_path).unwrap()
    );

    // The artifact opens with the same loader, unchanged
    let restored = load_snapshot(&artifact).unwrap().unwrap();
    assert_eq!(restored.seq, 1);
}

#[test]
fn backup_without_snapshot_errors() {
    let dir = TempDir::new().unwrap();
    let manager = BackupManager::new(dir.path().join("backups"), 5);
    let err = manager
        .create(&dir.path().join("missing.zst"), 1)
        .unwrap_err();
    assert!(matches!(err, BackupError::NoSnapshot));
}

#[test]
fn retention_keeps_most_recent_artifacts() {
    let dir = TempDir::new().unwrap();
    let snapshot_path = checkpointed_snapshot(&dir);
    let manager = BackupManager::new(dir.path().join("backups"), 3);

    for seq in 1..=5 {
        manager.create(&snapshot_path, seq).unwrap();
    }

    let artifacts = manager.list().unwrap();
    assert_eq!(artifacts.len(), 3);
    // Oldest two (seq 1, 2) were removed
    let names: Vec<String> = artifacts
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
        .collect();
    assert!(names.iter().all(|n| !n.ends_with("-00000001.zst")));
    assert!(names.iter().any(|n| n.ends_with("-00000005.zst")));
}

#[test]
fn integrity_check_passes_on_clean_store() {
    let dir = TempDir::new().unwrap();
    let snapshot_path = checkpointed_snapshot(&dir);
    let wal_path = dir.path().join("wal").join("events.wal");

    {
        let mut wal = Wal::open(&wal_path, 0).unwrap();
        wal.append(
            &Event::DeletionStarted {
                id: CorruptionId::new("c-1"),
            },
            1,
        )
        .unwrap();
        wal.flush().unwrap();
    }

    let report = integrity_check(&snapshot_path, &wal_path);
    assert!(report.is_ok());
    assert_eq!(report.snapshot_ok, Some(true));
    assert_eq!(report.wal_entries, 1);
    assert!(report.diagnostics.is_empty());
}

#[test]
fn integrity_check_tolerates_missing_files() {
    let dir = TempDir::new().unwrap();
    let report = integrity_check(
        &dir.path().join("snapshot.zst"),
        &dir.path().join("events.wal"),
    );
    assert!(report.is_ok());
    assert_eq!(report.snapshot_ok, None);
    assert_eq!(report.wal_entries, 0);
}

#[test]
fn integrity_check_flags_corrupt_snapshot() {
    let dir = TempDir::new().unwrap();
    let snapshot_path = dir.path().join("snapshot.zst");
    std::fs::write(&snapshot_path, b"definitely not zstd").unwrap();

    let report = integrity_check(&snapshot_path, &dir.path().join("events.wal"));
    assert!(!report.is_ok());
    assert_eq!(report.snapshot_ok, Some(false));
    assert!(!report.diagnostics.is_empty());
}
