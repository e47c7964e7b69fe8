// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health-check adapters.
//!
//! The contract is the tri-state verdict from `mendarr_core::HealthVerdict`:
//! a checker never errors out to the caller. Anything that prevents the
//! probe from reading the file (missing mount, permissions, a hung read)
//! is `Inaccessible`, which the engine routes to the rescan queue instead
//! of remediation.

mod command;

pub use command::CommandHealthChecker;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeHealthChecker;

use async_trait::async_trait;
use mendarr_core::{DetectionMethod, HealthVerdict};
use std::path::Path;

/// Predicate over a local media file.
#[async_trait]
pub trait HealthChecker: Clone + Send + Sync + 'static {
    async fn check(&self, path: &Path, method: DetectionMethod) -> HealthVerdict;
}
