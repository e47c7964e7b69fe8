// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted health checker for tests.

use super::HealthChecker;
use async_trait::async_trait;
use mendarr_core::{DetectionMethod, HealthVerdict};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Default)]
struct FakeState {
    verdicts: HashMap<PathBuf, VecOrOne>,
    checks: Vec<PathBuf>,
}

/// Either a fixed verdict or a queue consumed one check at a time.
enum VecOrOne {
    One(HealthVerdict),
    Queue(Vec<HealthVerdict>),
}

/// In-memory [`HealthChecker`] with per-path scripted verdicts.
///
/// Unscripted paths are healthy.
#[derive(Clone, Default)]
pub struct FakeHealthChecker {
    state: Arc<Mutex<FakeState>>,
}

impl FakeHealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every check of `path` yields `verdict`.
    pub fn set_verdict(&self, path: impl Into<PathBuf>, verdict: HealthVerdict) {
        self.state
            .lock()
            .verdicts
            .insert(path.into(), VecOrOne::One(verdict));
    }

    /// Successive checks of `path` consume the queue; the last entry
    /// repeats once drained.
    pub fn set_verdict_sequence(&self, path: impl Into<PathBuf>, verdicts: Vec<HealthVerdict>) {
        self.state
            .lock()
            .verdicts
            .insert(path.into(), VecOrOne::Queue(verdicts));
    }

    /// Paths checked so far, in order.
    pub fn checks(&self) -> Vec<PathBuf> {
        self.state.lock().checks.clone()
    }

    pub fn check_count(&self, path: &Path) -> usize {
        self.state
            .lock()
            .checks
            .iter()
            .filter(|p| p.as_path() == path)
            .count()
    }
}

#[async_trait]
impl HealthChecker for FakeHealthChecker {
    async fn check(&self, path: &Path, _method: DetectionMethod) -> HealthVerdict {
        let mut state = self.state.lock();
        state.checks.push(path.to_path_buf());
        match state.verdicts.get_mut(path) {
            None => HealthVerdict::Healthy,
            Some(VecOrOne::One(verdict)) => verdict.clone(),
            Some(VecOrOne::Queue(queue)) => {
                if queue.len() > 1 {
                    queue.remove(0)
                } else {
                    queue.first().cloned().unwrap_or(HealthVerdict::Healthy)
                }
            }
        }
    }
}
