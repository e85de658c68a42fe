// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jobsd: configuration and lifecycle of the job daemon

pub mod config;
pub mod lifecycle;

pub use config::DaemonConfig;
pub use lifecycle::{check, startup, validate_jobs, DaemonRuntime, DaemonState, LifecycleError};
