// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store maintenance, run as ordinary scheduled jobs
//!
//! - fix-stuck: running or paused tasks idle past a threshold become
//!   `Interrupted` (through a bounded-retry queue)
//! - prune-tasks: keep the most recent terminal tasks per job
//! - clean-jobs: delete auto-clean jobs whose tasks all ended

use crate::action::{ActionContext, ActionImpl, ActionRegistry};
use crate::error::ActionError;
use async_trait::async_trait;
use jobs_core::{
    Action, ActionMessage, ActionOutput, ControlCommand, ControlVerb, Event, EventBus, Job,
    RetryQueue, TaskRecord, TaskStatus, SYSTEM_USER,
};
use jobs_storage::{JobStore, StoreError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const FIX_STUCK_ACTION: &str = "actions.internal.fix-stuck";
pub const PRUNE_TASKS_ACTION: &str = "actions.internal.prune-tasks";
pub const CLEAN_JOBS_ACTION: &str = "actions.internal.clean-jobs";

/// Anchor for the recurring maintenance schedules
const SCHEDULE_START: &str = "2020-01-01T00:00:00Z";

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Running tasks older than this are considered stuck
    pub stale_threshold: Duration,
    /// Terminal tasks kept per job
    pub prune_keep: usize,
    /// Retries for each stuck-task fix
    pub max_retries: u32,
    /// ISO-8601 period between maintenance runs
    pub interval: String,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            stale_threshold: Duration::from_secs(60 * 60),
            prune_keep: 10,
            max_retries: 3,
            interval: "PT10M".to_string(),
        }
    }
}

pub struct FixStuckAction {
    store: Arc<dyn JobStore>,
    bus: EventBus,
    threshold: Duration,
    max_retries: u32,
}

#[async_trait]
impl ActionImpl for FixStuckAction {
    fn name(&self) -> &str {
        FIX_STUCK_ACTION
    }

    async fn run(
        &self,
        ctx: &ActionContext,
        input: ActionMessage,
    ) -> Result<ActionMessage, ActionError> {
        let now = ctx.now();
        let threshold = chrono::Duration::from_std(self.threshold)
            .map_err(|e| ActionError::invalid("stale_threshold", e.to_string()))?;
        let own = ctx.task_id();

        let mut queue = RetryQueue::new(self.max_retries);
        for task in self.store.find_stuck_tasks(now - threshold).await? {
            if task.id != own {
                queue.push(task.id.to_string(), task);
            }
        }
        let found = queue.len();
        if found == 0 {
            return Ok(input.with_output(ActionOutput::success().with_json(json!({"fixed": 0}))));
        }

        let store = self.store.clone();
        let bus = self.bus.clone();
        let message = format!(
            "interrupted: no completion within {}s",
            self.threshold.as_secs()
        );
        let result = queue
            .drain_all(now, |task: TaskRecord| {
                let store = store.clone();
                let bus = bus.clone();
                let message = message.clone();
                async move {
                    // A live task still holding its branches is told to stop too
                    bus.publish(Event::Control(ControlCommand::task(
                        task.id.clone(),
                        ControlVerb::Stop,
                    )));
                    let mut fixed = task;
                    fixed.status = TaskStatus::Interrupted;
                    fixed.end_time = Some(now);
                    fixed.status_message = message;
                    fixed.can_pause = false;
                    fixed.can_stop = false;
                    store.put_task(fixed.clone()).await?;
                    // Lets the runtime close the live task and free its slot
                    bus.publish(Event::TaskStatus(fixed));
                    Ok::<(), StoreError>(())
                }
            })
            .await;

        match result {
            Ok(fixed) => {
                info!(fixed, "stuck tasks interrupted");
                Ok(input.with_output(ActionOutput::success().with_json(json!({"fixed": fixed}))))
            }
            Err(e) => {
                warn!(error = %e, found, "some stuck tasks could not be fixed");
                Err(ActionError::Failed(e.to_string()))
            }
        }
    }
}

pub struct PruneTasksAction {
    store: Arc<dyn JobStore>,
    keep: usize,
}

#[async_trait]
impl ActionImpl for PruneTasksAction {
    fn name(&self) -> &str {
        PRUNE_TASKS_ACTION
    }

    async fn run(
        &self,
        _ctx: &ActionContext,
        input: ActionMessage,
    ) -> Result<ActionMessage, ActionError> {
        let deleted = self
            .store
            .delete_tasks(None, &TaskStatus::TERMINAL, self.keep)
            .await?;
        if deleted > 0 {
            info!(deleted, keep = self.keep, "pruned tasks");
        }
        Ok(input.with_output(ActionOutput::success().with_json(json!({"deleted": deleted}))))
    }
}

pub struct CleanJobsAction {
    store: Arc<dyn JobStore>,
    bus: EventBus,
}

#[async_trait]
impl ActionImpl for CleanJobsAction {
    fn name(&self) -> &str {
        CLEAN_JOBS_ACTION
    }

    async fn run(
        &self,
        _ctx: &ActionContext,
        input: ActionMessage,
    ) -> Result<ActionMessage, ActionError> {
        let deleted = self.store.delete_auto_clean_jobs().await?;
        for job_id in &deleted {
            info!(job = %job_id, "auto-clean job deleted");
            self.bus.publish(Event::JobDeleted {
                job_id: job_id.clone(),
            });
        }
        let ids: Vec<&str> = deleted.iter().map(|id| id.as_str()).collect();
        Ok(input.with_output(ActionOutput::success().with_json(json!({"deleted": ids}))))
    }
}

/// Register the three maintenance actions
pub fn register_maintenance(
    registry: &mut ActionRegistry,
    store: Arc<dyn JobStore>,
    bus: EventBus,
    config: &MaintenanceConfig,
) {
    {
        let (store, bus) = (store.clone(), bus.clone());
        let (threshold, max_retries) = (config.stale_threshold, config.max_retries);
        registry.register(FIX_STUCK_ACTION, move || {
            Box::new(FixStuckAction {
                store: store.clone(),
                bus: bus.clone(),
                threshold,
                max_retries,
            })
        });
    }
    {
        let store = store.clone();
        let keep = config.prune_keep;
        registry.register(PRUNE_TASKS_ACTION, move || {
            Box::new(PruneTasksAction {
                store: store.clone(),
                keep,
            })
        });
    }
    registry.register(CLEAN_JOBS_ACTION, move || {
        Box::new(CleanJobsAction {
            store: store.clone(),
            bus: bus.clone(),
        })
    });
}

/// The recurring system jobs running each maintenance action
pub fn system_jobs(config: &MaintenanceConfig) -> Vec<Job> {
    let schedule = format!("R/{SCHEDULE_START}/{}", config.interval);
    [
        ("internal-fix-stuck", "Fix stuck tasks", FIX_STUCK_ACTION),
        ("internal-prune-tasks", "Prune old tasks", PRUNE_TASKS_ACTION),
        ("internal-clean-jobs", "Clean finished jobs", CLEAN_JOBS_ACTION),
    ]
    .into_iter()
    .map(|(id, label, action)| {
        let mut job = Job::new(id, label)
            .with_schedule(schedule.clone())
            .with_action(Action::new(action))
            .with_max_concurrency(1);
        job.owner = SYSTEM_USER.to_string();
        job
    })
    .collect()
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
