// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use jobs_core::{JobId, ScheduleError, SelectError};
use jobs_storage::StoreError;
use thiserror::Error;

/// Errors raised while running one action
#[derive(Debug, Error)]
pub enum ActionError {
    /// Stop was requested; not a failure
    #[error("stopped")]
    Stopped,
    #[error("no action registered as {0:?}")]
    Unresolved(String),
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: String, message: String },
    #[error("{0}")]
    Failed(String),
    #[error("selection failed: {0}")]
    Select(#[from] SelectError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ActionError {
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        ActionError::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur in the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("bad schedule for job {job_id}: {source}")]
    Schedule {
        job_id: JobId,
        #[source]
        source: ScheduleError,
    },
}
