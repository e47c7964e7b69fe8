// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for mendarr: event WAL, materialized state, snapshots.

mod backup;
mod checkpoint;
mod migration;
mod snapshot;
mod state;
mod wal;

pub use backup::{integrity_check, BackupError, BackupManager, IntegrityReport, DEFAULT_RETAIN};
pub use checkpoint::{
    load_snapshot, CheckpointError, CheckpointHandle, CheckpointResult, CheckpointWriter,
    Checkpointer, FsCheckpointWriter,
};
pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::{path_key, DashboardStats, MaterializedState, PruneReport, ScheduleRecord};
pub use wal::{Wal, WalEntry, WalError};
