// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mendarr_core::{CorruptionId, CorruptionKind, Event, ScanPathId};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn sample_state() -> MaterializedState {
    let mut state = MaterializedState::default();
    state.apply(
        1,
        10,
        &Event::CorruptionDetected {
            id: CorruptionId::new("c-1"),
            file_path: PathBuf::from("/media/a.mkv"),
            scan_path_id: ScanPathId::new("movies"),
            corruption_type: CorruptionKind::VideoStream,
            detail: "bad".to_string(),
        },
    );
    state
}

#[test]
fn checkpoint_roundtrips_through_compressed_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.zst");
    let checkpointer = Checkpointer::new(path.clone());

    let result = checkpointer.checkpoint_sync(7, &sample_state()).unwrap();
    assert_eq!(result.seq, 7);
    assert!(result.size_bytes > 0);

    let snapshot = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(snapshot.seq, 7);
    assert_eq!(snapshot.version, CURRENT_SNAPSHOT_VERSION);
    assert_eq!(snapshot.state.read_aggregate("c-1").len(), 1);
}

#[test]
fn background_checkpoint_completes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.zst");
    let checkpointer = Checkpointer::new(path.clone());

    let handle = checkpointer.start(3, &sample_state());
    let result = handle.wait().unwrap();
    assert_eq!(result.seq, 3);
    assert!(path.exists());
}

#[test]
fn load_missing_snapshot_is_none() {
    let dir = TempDir::new().unwrap();
    assert!(load_snapshot(&dir.path().join("nope.zst")).unwrap().is_none());
}

/// Records the order of writer operations for fsync-ordering assertions.
#[derive(Clone)]
struct RecordingWriter {
    ops: Arc<Mutex<Vec<String>>>,
    inner: FsCheckpointWriter,
}

impl Default for RecordingWriter {
    fn default() -> Self {
        Self {
            ops: Arc::new(Mutex::new(Vec::new())),
            inner: FsCheckpointWriter,
        }
    }
}

impl RecordingWriter {
    fn record(&self, op: &str) {
        self.ops.lock().push(op.to_string());
    }
}

impl CheckpointWriter for RecordingWriter {
    fn write_tmp(&self, path: &std::path::Path, data: &[u8]) -> Result<(), CheckpointError> {
        self.record("write_tmp");
        self.inner.write_tmp(path, data)
    }

    fn fsync_file(&self, path: &std::path::Path) -> Result<(), CheckpointError> {
        self.record("fsync_file");
        self.inner.fsync_file(path)
    }

    fn rename(&self, from: &std::path::Path, to: &std::path::Path) -> Result<(), CheckpointError> {
        self.record("rename");
        self.inner.rename(from, to)
    }

    fn fsync_dir(&self, path: &std::path::Path) -> Result<(), CheckpointError> {
        self.record("fsync_dir");
        self.inner.fsync_dir(path)
    }

    fn file_size(&self, path: &std::path::Path) -> Result<u64, CheckpointError> {
        self.record("file_size");
        self.inner.file_size(path)
    }
}

#[test]
fn durability_ordering_is_fsync_before_rename_before_dir_fsync() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.zst");
    let writer = RecordingWriter::default();
    let ops = Arc::clone(&writer.ops);
    let checkpointer = Checkpointer::with_writer(writer, path);

    checkpointer.checkpoint_sync(1, &sample_state()).unwrap();

    let recorded = ops.lock().clone();
    assert_eq!(
        recorded,
        vec!["write_tmp", "fsync_file", "rename", "fsync_dir", "file_size"]
    );
}
