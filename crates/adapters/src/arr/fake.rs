// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted manager client for tests.
//!
//! Items, queue snapshots and history entries are seeded up front; every
//! call is recorded. Failures can be injected for the next N calls to
//! exercise the retry and ceiling paths.

use super::{ArrClient, ArrError, HistoryEntry, ItemRef, QueueEntry};
use async_trait::async_trait;
use mendarr_core::ArrInstance;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A recorded call against the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    Lookup(PathBuf),
    DeleteFile(u64),
    SearchItem(u64),
    Queue,
    HistorySince(u64),
    ItemFile(u64),
}

/// Which fake operation a scripted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    Lookup,
    DeleteFile,
    SearchItem,
    Queue,
    History,
    ItemFile,
}

#[derive(Default)]
struct FakeState {
    items_by_path: HashMap<PathBuf, ItemRef>,
    /// Successive queue snapshots; the last one repeats once drained
    queue_snapshots: VecDeque<Vec<QueueEntry>>,
    history: Vec<HistoryEntry>,
    item_files: HashMap<u64, PathBuf>,
    failures: HashMap<FakeOp, VecDeque<ArrError>>,
    calls: Vec<FakeCall>,
}

/// In-memory [`ArrClient`] with scripted responses.
#[derive(Clone, Default)]
pub struct FakeArrClient {
    state: Arc<Mutex<FakeState>>,
}

impl FakeArrClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&self, path: impl Into<PathBuf>, item: ItemRef) {
        self.state.lock().items_by_path.insert(path.into(), item);
    }

    /// Push a queue snapshot; snapshots are consumed in order, and an empty
    /// snapshot list means an empty queue.
    pub fn push_queue_snapshot(&self, entries: Vec<QueueEntry>) {
        self.state.lock().queue_snapshots.push_back(entries);
    }

    pub fn add_history(&self, entry: HistoryEntry) {
        self.state.lock().history.push(entry);
    }

    pub fn set_item_file(&self, item_id: u64, path: impl Into<PathBuf>) {
        self.state.lock().item_files.insert(item_id, path.into());
    }

    /// Fail the next call of the given operation (queue several for
    /// several consecutive failures).
    pub fn fail_next(&self, op: FakeOp, error: ArrError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().calls.clone()
    }

    fn check_failure(&self, op: FakeOp) -> Result<(), ArrError> {
        match self
            .state
            .lock()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn record(&self, call: FakeCall) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl ArrClient for FakeArrClient {
    async fn lookup_item_by_path(
        &self,
        _instance: &ArrInstance,
        path: &Path,
    ) -> Result<ItemRef, ArrError> {
        self.record(FakeCall::Lookup(path.to_path_buf()));
        self.check_failure(FakeOp::Lookup)?;
        self.state
            .lock()
            .items_by_path
            .get(path)
            .cloned()
            .ok_or(ArrError::NotFound)
    }

    async fn delete_file(&self, _instance: &ArrInstance, file_id: u64) -> Result<(), ArrError> {
        self.record(FakeCall::DeleteFile(file_id));
        self.check_failure(FakeOp::DeleteFile)
    }

    async fn search_item(&self, _instance: &ArrInstance, item_id: u64) -> Result<(), ArrError> {
        self.record(FakeCall::SearchItem(item_id));
        self.check_failure(FakeOp::SearchItem)
    }

    async fn queue(&self, _instance: &ArrInstance) -> Result<Vec<QueueEntry>, ArrError> {
        self.record(FakeCall::Queue);
        self.check_failure(FakeOp::Queue)?;
        let mut state = self.state.lock();
        Ok(match state.queue_snapshots.len() {
            0 => Vec::new(),
            1 => state.queue_snapshots[0].clone(),
            _ => state.queue_snapshots.pop_front().unwrap_or_default(),
        })
    }

    async fn history_since(
        &self,
        _instance: &ArrInstance,
        since_ms: u64,
    ) -> Result<Vec<HistoryEntry>, ArrError> {
        self.record(FakeCall::HistorySince(since_ms));
        self.check_failure(FakeOp::History)?;
        Ok(self
            .state
            .lock()
            .history
            .iter()
            .filter(|entry| entry.date_ms >= since_ms)
            .cloned()
            .collect())
    }

    async fn item_file(
        &self,
        _instance: &ArrInstance,
        item_id: u64,
    ) -> Result<Option<PathBuf>, ArrError> {
        self.record(FakeCall::ItemFile(item_id));
        self.check_failure(FakeOp::ItemFile)?;
        Ok(self.state.lock().item_files.get(&item_id).cloned())
    }
}
