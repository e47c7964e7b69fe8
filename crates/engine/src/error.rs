// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types

use thiserror::Error;

/// Errors surfaced by the runtime while handling events.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("scan {0} not found")]
    ScanNotFound(u64),
    #[error("scan path '{0}' not configured")]
    ScanPathNotFound(String),
    #[error("manager instance '{0}' not configured")]
    InstanceNotFound(String),
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },
    #[error("event channel closed")]
    ChannelClosed,
}
