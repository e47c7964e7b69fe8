// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup artifacts and store integrity checking.
//!
//! A backup is a byte-for-byte copy of the compressed snapshot after a
//! checkpoint has forced all buffered writes out, so it is openable by the
//! same engine unchanged. The `backups/` directory retains the K most
//! recent artifacts.

use crate::{load_snapshot, Wal};
use chrono::Utc;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Default number of backup artifacts to retain.
pub const DEFAULT_RETAIN: usize = 5;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no snapshot exists to back up")]
    NoSnapshot,
}

/// Outcome of an integrity check over the store files.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    /// Snapshot parsed and migrated cleanly (None when absent)
    pub snapshot_ok: Option<bool>,
    /// WAL scanned without a corrupt tail
    pub wal_ok: bool,
    /// Number of WAL entries scanned
    pub wal_entries: usize,
    pub diagnostics: Vec<String>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.wal_ok && self.snapshot_ok.unwrap_or(true)
    }
}

/// Creates snapshot backups and enforces count-based retention.
pub struct BackupManager {
    backups_dir: PathBuf,
    retain: usize,
}

impl BackupManager {
    pub fn new(backups_dir: PathBuf, retain: usize) -> Self {
        Self {
            backups_dir,
            retain: retain.max(1),
        }
    }

    /// Copy the current snapshot into the backups directory.
    ///
    /// The caller must checkpoint first so the snapshot reflects every
    /// processed event; `seq` is the checkpointed sequence and keeps names
    /// unique within one second. Returns the artifact path.
    pub fn create(&self, snapshot_path: &Path, seq: u64) -> Result<PathBuf, BackupError> {
        if !snapshot_path.exists() {
            return Err(BackupError::NoSnapshot);
        }
        fs::create_dir_all(&self.backups_dir)?;

        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let name = format!("snapshot-{stamp}-{seq:08}.zst");
        let artifact = self.backups_dir.join(&name);
        let tmp = artifact.with_extension("tmp");

        // Copy then fsync so a crash never leaves a torn artifact in place
        {
            let data = fs::read(snapshot_path)?;
            let mut file = File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &artifact)?;

        info!(artifact = %artifact.display(), "backup created");
        self.enforce_retention()?;
        Ok(artifact)
    }

    /// Remove all but the most recent `retain` artifacts.
    fn enforce_retention(&self) -> Result<(), BackupError> {
        let mut artifacts: Vec<PathBuf> = fs::read_dir(&self.backups_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().and_then(|e| e.to_str()) == Some("zst")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with("snapshot-"))
                        .unwrap_or(false)
            })
            .collect();

        // Timestamped names sort chronologically
        artifacts.sort();
        while artifacts.len() > self.retain {
            let oldest = artifacts.remove(0);
            if let Err(e) = fs::remove_file(&oldest) {
                warn!(path = %oldest.display(), error = %e, "failed to remove old backup");
            }
        }
        Ok(())
    }

    /// List retained artifacts, oldest first.
    pub fn list(&self) -> Result<Vec<PathBuf>, BackupError> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }
        let mut artifacts: Vec<PathBuf> = fs::read_dir(&self.backups_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("zst"))
            .collect();
        artifacts.sort();
        Ok(artifacts)
    }
}

/// Verify the store files parse cleanly.
///
/// Failures are reported, not fatal: the daemon logs the diagnostics and
/// continues with whatever recovers.
pub fn integrity_check(snapshot_path: &Path, wal_path: &Path) -> IntegrityReport {
    let mut report = IntegrityReport::default();

    match load_snapshot(snapshot_path) {
        Ok(Some(_)) => report.snapshot_ok = Some(true),
        Ok(None) => report.snapshot_ok = None,
        Err(e) => {
            report.snapshot_ok = Some(false);
            report.diagnostics.push(format!("snapshot: {e}"));
        }
    }

    if wal_path.exists() {
        match Wal::open(wal_path, 0) {
            Ok(wal) => match wal.entries_after(0) {
                Ok(entries) => {
                    report.wal_ok = true;
                    report.wal_entries = entries.len();
                }
                Err(e) => {
                    report.diagnostics.push(format!("wal scan: {e}"));
                }
            },
            Err(e) => {
                report.diagnostics.push(format!("wal open: {e}"));
            }
        }
    } else {
        report.wal_ok = true;
    }

    report
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
