// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task records: the persisted, published view of one job run

use crate::id::{JobId, TaskId};
use crate::job::Action;
use crate::message::ActionMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Running,
    Paused,
    Finished,
    Error,
    Interrupted,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Error | TaskStatus::Interrupted
        )
    }

    /// Live statuses the staleness scan looks at
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Running | TaskStatus::Paused)
    }

    pub const TERMINAL: [TaskStatus; 3] = [
        TaskStatus::Finished,
        TaskStatus::Error,
        TaskStatus::Interrupted,
    ];
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Paused => "paused",
            TaskStatus::Finished => "finished",
            TaskStatus::Error => "error",
            TaskStatus::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// One recorded action invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    /// The action as invoked, chained actions stripped
    pub action: Action,
    pub input: ActionMessage,
    /// Output message holding only its last chain entry
    pub output: ActionMessage,
}

/// Snapshot of a task as published on the status topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub job_id: JobId,
    pub status: TaskStatus,
    #[serde(default)]
    pub status_message: String,
    pub trigger_owner: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// 0.0 ..= 1.0
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub can_pause: bool,
    #[serde(default)]
    pub can_stop: bool,
    #[serde(default)]
    pub actions_logs: Vec<ActionLog>,
}

impl TaskRecord {
    pub fn new(id: TaskId, job_id: JobId, trigger_owner: impl Into<String>) -> Self {
        Self {
            id,
            job_id,
            status: TaskStatus::Queued,
            status_message: String::new(),
            trigger_owner: trigger_owner.into(),
            start_time: None,
            end_time: None,
            progress: 0.0,
            can_pause: true,
            can_stop: true,
            actions_logs: Vec::new(),
        }
    }

    /// Most recent moment this task did something
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.end_time.or(self.start_time)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
