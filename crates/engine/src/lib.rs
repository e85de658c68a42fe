// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Job engine: tasks, runnables and triggers

mod action;
pub mod actions;
mod concurrency;
mod control;
mod delivery;
mod dispatcher;
mod error;
pub mod maintenance;
mod producer;
mod runnable;
mod runtime;
mod task;

#[cfg(test)]
mod testing;

pub use action::{ActionContext, ActionFactory, ActionImpl, ActionRegistry};
pub use actions::register_builtin;
pub use concurrency::ConcurrencyGate;
pub use control::{ControlHandle, RunState};
pub use delivery::StatusDelivery;
pub use dispatcher::{Dispatcher, RunQueue};
pub use error::{ActionError, RuntimeError};
pub use maintenance::{register_maintenance, system_jobs, MaintenanceConfig};
pub use producer::{EventProducer, Fired, ScheduleWaiter};
pub use runnable::{enqueue_runnables, launch, Branch, ExecDeps, Runnable};
pub use runtime::{Runtime, RuntimeConfig, RuntimeDeps};
pub use task::{Now, Task};
