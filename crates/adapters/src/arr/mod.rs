// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clients for external "arr-family" catalog managers.

mod breaker;
mod http;
mod rate_limit;
mod retry;
mod ssrf;

pub use breaker::CircuitBreaker;
pub use http::{HttpArrClient, RateLimits};
pub use rate_limit::TokenBucket;
pub use retry::RetryPolicy;
pub use ssrf::validate_base_url;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeArrClient, FakeCall, FakeOp};

use async_trait::async_trait;
use mendarr_core::ArrInstance;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from external-manager calls
#[derive(Debug, Clone, Error)]
pub enum ArrError {
    /// The item (or its file) does not exist in the manager's library
    #[error("item not found")]
    NotFound,
    /// The instance's circuit breaker is open
    #[error("instance unavailable (circuit open)")]
    Unavailable,
    /// Non-404 4xx: the request itself is wrong, retrying cannot help
    #[error("request rejected: HTTP {status}")]
    Rejected { status: u16 },
    /// 5xx from the manager, retried with backoff before surfacing
    #[error("server error: HTTP {status}")]
    Server { status: u16 },
    /// Connect/timeout/transport failure, retried with backoff
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
    #[error("credential error: {0}")]
    Credential(String),
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl ArrError {
    /// Transient errors are worth retrying; the rest fail fast.
    pub fn is_transient(&self) -> bool {
        matches!(self, ArrError::Server { .. } | ArrError::Network(_))
    }
}

/// A library item reference: the owning item plus its current file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    /// Series/movie id the manager uses in commands
    pub item_id: u64,
    /// The media-file record id (deletion target)
    pub file_id: u64,
    pub title: String,
}

/// One record in the manager's active-download queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub item_id: u64,
    pub title: String,
    /// Download completion 0-100 when the manager reports sizes
    pub percent: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEventKind {
    Grabbed,
    Imported,
    ImportFailed,
    Deleted,
    Other,
}

/// One record from the manager's history feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub item_id: u64,
    pub kind: HistoryEventKind,
    /// Path the import landed at, in the manager's namespace
    pub imported_path: Option<PathBuf>,
    pub date_ms: u64,
}

/// Client contract to one or more external catalog managers.
///
/// Every implementation routes calls through the per-instance rate limiter
/// and circuit breaker; callers never see a request storm exceed
/// rps + burst per second per instance.
#[async_trait]
pub trait ArrClient: Clone + Send + Sync + 'static {
    /// Find the library item owning the given file path (manager namespace).
    async fn lookup_item_by_path(
        &self,
        instance: &ArrInstance,
        path: &Path,
    ) -> Result<ItemRef, ArrError>;

    /// Delete the item's current file from the library.
    async fn delete_file(&self, instance: &ArrInstance, file_id: u64) -> Result<(), ArrError>;

    /// Ask the manager to search for a replacement.
    async fn search_item(&self, instance: &ArrInstance, item_id: u64) -> Result<(), ArrError>;

    /// The manager's active-download queue.
    async fn queue(&self, instance: &ArrInstance) -> Result<Vec<QueueEntry>, ArrError>;

    /// History records since the given time.
    async fn history_since(
        &self,
        instance: &ArrInstance,
        since_ms: u64,
    ) -> Result<Vec<HistoryEntry>, ArrError>;

    /// Current file path of an item (manager namespace), if it has one.
    async fn item_file(
        &self,
        instance: &ArrInstance,
        item_id: u64,
    ) -> Result<Option<PathBuf>, ArrError>;
}
