// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events carried on the system bus

use crate::id::{JobId, TaskId};
use crate::message::{NodeChange, TriggerEvent, UserChange};
use crate::task::TaskRecord;
use serde::{Deserialize, Serialize};

/// Topic for task status snapshots
pub const TASK_STATUS_TOPIC: &str = "task:status";
/// Topic for pause/resume/stop commands
pub const TASK_CONTROL_TOPIC: &str = "task:control";
/// Topic for job triggers
pub const JOB_TRIGGER_TOPIC: &str = "job:trigger";

/// What a control command applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlTarget {
    Task(TaskId),
    /// Every live task of the job
    Job(JobId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlVerb {
    Pause,
    Resume,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub target: ControlTarget,
    pub verb: ControlVerb,
}

impl ControlCommand {
    pub fn task(id: impl Into<TaskId>, verb: ControlVerb) -> Self {
        Self {
            target: ControlTarget::Task(id.into()),
            verb,
        }
    }

    pub fn job(id: impl Into<JobId>, verb: ControlVerb) -> Self {
        Self {
            target: ControlTarget::Job(id.into()),
            verb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Start a task for a job
    JobTrigger {
        job_id: JobId,
        trigger: TriggerEvent,
        /// Identity the task runs under
        owner: String,
    },
    /// A job definition was created or changed in the store
    JobChanged { job_id: JobId },
    JobDeleted { job_id: JobId },
    NodeChange(NodeChange),
    UserChange(UserChange),
    /// Full task snapshot, published after every task mutation
    TaskStatus(TaskRecord),
    Control(ControlCommand),
}

impl Event {
    /// Topic name used for subscription matching
    pub fn name(&self) -> String {
        match self {
            Event::JobTrigger { .. } => JOB_TRIGGER_TOPIC.to_string(),
            Event::JobChanged { .. } => "job:update".to_string(),
            Event::JobDeleted { .. } => "job:delete".to_string(),
            Event::NodeChange(change) => format!("node:{}", change.kind.as_str()),
            Event::UserChange(change) => format!("user:{}", change.kind.as_str()),
            Event::TaskStatus(_) => TASK_STATUS_TOPIC.to_string(),
            Event::Control(_) => TASK_CONTROL_TOPIC.to_string(),
        }
    }

    /// The trigger payload this event hands to a job, for entity changes
    pub fn as_trigger(&self) -> Option<TriggerEvent> {
        match self {
            Event::NodeChange(change) => Some(TriggerEvent::NodeChange(change.clone())),
            Event::UserChange(change) => Some(TriggerEvent::UserChange(change.clone())),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
