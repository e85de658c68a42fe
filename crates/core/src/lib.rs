// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jobs-core: data model and shared primitives for the job engine
//!
//! This crate provides:
//! - Jobs, actions, task records and the action message payload
//! - ISO-8601 recurring schedules
//! - The node/user query algebra and selectors over entity providers
//! - The event bus and the bounded-retry queue
//! - Clock and id abstractions for deterministic tests

pub mod clock;
pub mod id;

pub mod event;
pub mod events;
pub mod job;
pub mod message;
pub mod provider;
pub mod query;
pub mod retry;
pub mod schedule;
pub mod selector;
pub mod task;

pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{
    ControlCommand, ControlTarget, ControlVerb, Event, JOB_TRIGGER_TOPIC, TASK_CONTROL_TOPIC,
    TASK_STATUS_TOPIC,
};
pub use events::{EventBus, EventPattern, EventReceiver, Subscription};
pub use id::{IdGen, JobId, SequentialIdGen, TaskId, UuidIdGen};
pub use job::{Action, Job, Schedule, SYSTEM_USER};
pub use message::{
    ActionMessage, ActionOutput, ChangeKind, Entity, Node, NodeChange, NodeType, TriggerEvent,
    User, UserChange,
};
pub use provider::{NodeProvider, NodeRequest, ProviderError, Providers, UserProvider, UserRequest};
pub use query::{glob_match, NodeQuery, Operation, Predicate, Query, UserQuery};
pub use retry::{BatchError, DeadLetter, DrainReport, RetryFailure, RetryItem, RetryQueue};
pub use schedule::{parse_iso_duration, RecurringSchedule, ScheduleError};
pub use selector::{NodesSelector, SelectError, Selector, UsersSelector};
pub use task::{ActionLog, TaskRecord, TaskStatus};
