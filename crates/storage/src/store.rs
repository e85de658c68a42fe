// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository contract consumed by the engine

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobs_core::{Job, JobId, TaskId, TaskRecord, TaskStatus};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid id for storage: {0:?}")]
    InvalidId(String),
}

/// Which jobs `list_jobs` returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobFilter {
    /// Only jobs with a schedule
    pub schedule_only: bool,
    /// Only jobs listening to bus events
    pub event_only: bool,
    pub include_inactive: bool,
}

impl JobFilter {
    pub fn scheduled() -> Self {
        Self {
            schedule_only: true,
            ..Self::default()
        }
    }

    pub fn event_driven() -> Self {
        Self {
            event_only: true,
            ..Self::default()
        }
    }

    pub fn accepts(&self, job: &Job) -> bool {
        (self.include_inactive || !job.inactive)
            && (!self.schedule_only || job.is_scheduled())
            && (!self.event_only || !job.event_names.is_empty())
    }
}

/// CRUD plus maintenance queries over jobs and task records
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    async fn put_job(&self, job: Job) -> Result<(), StoreError>;

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, StoreError>;

    /// Delete a job and its tasks; false if it did not exist
    async fn delete_job(&self, id: &JobId) -> Result<bool, StoreError>;

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError>;

    /// Insert or update a task snapshot
    async fn put_task(&self, task: TaskRecord) -> Result<(), StoreError>;

    async fn get_task(&self, id: &TaskId) -> Result<Option<TaskRecord>, StoreError>;

    /// Tasks of a job, oldest first; empty `statuses` means any status
    async fn list_tasks(
        &self,
        job_id: &JobId,
        statuses: &[TaskStatus],
    ) -> Result<Vec<TaskRecord>, StoreError>;

    /// Running or paused tasks that started before `started_before`
    async fn find_stuck_tasks(
        &self,
        started_before: DateTime<Utc>,
    ) -> Result<Vec<TaskRecord>, StoreError>;

    /// Delete tasks in `statuses`, keeping the `keep` most recent per job.
    /// Returns how many were deleted.
    async fn delete_tasks(
        &self,
        job_id: Option<&JobId>,
        statuses: &[TaskStatus],
        keep: usize,
    ) -> Result<usize, StoreError>;

    /// Delete auto-clean jobs whose tasks have all reached a terminal status
    async fn delete_auto_clean_jobs(&self) -> Result<Vec<JobId>, StoreError>;

    /// Stream a job's tasks into `tx`, oldest first
    async fn stream_tasks(
        &self,
        job_id: &JobId,
        tx: mpsc::Sender<TaskRecord>,
    ) -> Result<(), StoreError> {
        for task in self.list_tasks(job_id, &[]).await? {
            if tx.send(task).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}
