// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters to the outside world: external catalog managers and the
//! media probe behind the health-check contract.

pub mod arr;
pub mod health;
pub mod secrets;

pub use arr::{
    ArrClient, ArrError, CircuitBreaker, HistoryEntry, HistoryEventKind, HttpArrClient, ItemRef,
    QueueEntry, RateLimits, RetryPolicy, TokenBucket,
};
pub use health::{CommandHealthChecker, HealthChecker};
pub use secrets::{SecretBox, SecretError, ENC_PREFIX};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use arr::{FakeArrClient, FakeCall, FakeOp};
#[cfg(any(test, feature = "test-support"))]
pub use health::FakeHealthChecker;
