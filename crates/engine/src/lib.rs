// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mendarr-engine: the services that advance the corruption lifecycle.
//!
//! The runtime routes every durable event to its handler; scanner,
//! remediator, verifier, monitor and scheduler are handler groups plus
//! spawned worker tasks. Services hold no references to each other; all
//! cross-service flow is events through the bus.

pub mod config;
pub mod cron;
mod error;
pub mod runtime;

pub use config::RuntimeConfig;
pub use cron::CronExpr;
pub use error::EngineError;
pub use runtime::{Runtime, RuntimeDeps};
