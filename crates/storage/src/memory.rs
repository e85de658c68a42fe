// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory job store with optional JSON write-through

use crate::json::JsonStore;
use crate::store::{JobFilter, JobStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobs_core::{Job, JobId, TaskId, TaskRecord, TaskStatus};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::{debug, info};

const JOBS: &str = "jobs";
const TASKS: &str = "tasks";

#[derive(Default)]
struct StoreState {
    jobs: HashMap<JobId, Job>,
    tasks: HashMap<TaskId, TaskRecord>,
}

impl StoreState {
    fn tasks_of<'a>(&'a self, job_id: &'a JobId) -> impl Iterator<Item = &'a TaskRecord> + 'a {
        self.tasks.values().filter(move |t| &t.job_id == job_id)
    }
}

/// Job store held in memory. When opened on a directory every write is
/// mirrored to JSON files and the directory is reloaded on open.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
    persist: Option<JsonStore>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a persistent store under `dir`, loading what is already there
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let json = JsonStore::open(dir)?;
        let mut state = StoreState::default();
        for job in json.load_all::<Job>(JOBS)? {
            state.jobs.insert(job.id.clone(), job);
        }
        for task in json.load_all::<TaskRecord>(TASKS)? {
            state.tasks.insert(task.id.clone(), task);
        }
        info!(
            jobs = state.jobs.len(),
            tasks = state.tasks.len(),
            path = %json.base_path().display(),
            "loaded job store"
        );
        Ok(Self {
            state: RwLock::new(state),
            persist: Some(json),
        })
    }

    fn write_job(&self, job: &Job) -> Result<(), StoreError> {
        match &self.persist {
            Some(json) => json.save(JOBS, job.id.as_str(), job),
            None => Ok(()),
        }
    }

    fn write_task(&self, task: &TaskRecord) -> Result<(), StoreError> {
        match &self.persist {
            Some(json) => json.save(TASKS, task.id.as_str(), task),
            None => Ok(()),
        }
    }

    fn remove(&self, kind: &str, id: &str) -> Result<(), StoreError> {
        match &self.persist {
            Some(json) => json.delete(kind, id),
            None => Ok(()),
        }
    }

    fn remove_tasks(&self, ids: &[TaskId]) -> Result<(), StoreError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        for id in ids {
            state.tasks.remove(id);
        }
        drop(state);
        for id in ids {
            self.remove(TASKS, id.as_str())?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn put_job(&self, job: Job) -> Result<(), StoreError> {
        self.write_job(&job)?;
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state.jobs.get(id).cloned())
    }

    async fn delete_job(&self, id: &JobId) -> Result<bool, StoreError> {
        let (existed, task_ids) = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            let existed = state.jobs.remove(id).is_some();
            let task_ids: Vec<TaskId> = state.tasks_of(id).map(|t| t.id.clone()).collect();
            (existed, task_ids)
        };
        self.remove(JOBS, id.as_str())?;
        self.remove_tasks(&task_ids)?;
        Ok(existed)
    }

    async fn list_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| filter.accepts(j))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }

    async fn put_task(&self, task: TaskRecord) -> Result<(), StoreError> {
        // Check, persist and insert under one write lock so concurrent
        // writers cannot reorder around the terminal check
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = state.tasks.get(&task.id) {
            // A terminal status is final; late snapshots must not change it
            if existing.status.is_terminal() && task.status != existing.status {
                debug!(task = %task.id, status = %task.status, stored = %existing.status, "ignoring stale snapshot");
                return Ok(());
            }
        }
        self.write_task(&task)?;
        state.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<TaskRecord>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state.tasks.get(id).cloned())
    }

    async fn list_tasks(
        &self,
        job_id: &JobId,
        statuses: &[TaskStatus],
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut tasks: Vec<TaskRecord> = state
            .tasks_of(job_id)
            .filter(|t| statuses.is_empty() || statuses.contains(&t.status))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn find_stuck_tasks(
        &self,
        started_before: DateTime<Utc>,
    ) -> Result<Vec<TaskRecord>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut stuck: Vec<TaskRecord> = state
            .tasks
            .values()
            .filter(|t| t.status.is_active())
            .filter(|t| t.start_time.is_some_and(|s| s < started_before))
            .cloned()
            .collect();
        stuck.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(stuck)
    }

    async fn delete_tasks(
        &self,
        job_id: Option<&JobId>,
        statuses: &[TaskStatus],
        keep: usize,
    ) -> Result<usize, StoreError> {
        let doomed: Vec<TaskId> = {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            let mut by_job: HashMap<&JobId, Vec<&TaskRecord>> = HashMap::new();
            for task in state.tasks.values() {
                if job_id.is_some_and(|j| j != &task.job_id) {
                    continue;
                }
                if !statuses.is_empty() && !statuses.contains(&task.status) {
                    continue;
                }
                by_job.entry(&task.job_id).or_default().push(task);
            }
            by_job
                .into_values()
                .flat_map(|mut tasks| {
                    // Newest first; everything past `keep` goes
                    tasks.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
                    tasks.into_iter().skip(keep).map(|t| t.id.clone())
                })
                .collect()
        };
        self.remove_tasks(&doomed)?;
        Ok(doomed.len())
    }

    async fn delete_auto_clean_jobs(&self) -> Result<Vec<JobId>, StoreError> {
        let done: Vec<JobId> = {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            state
                .jobs
                .values()
                .filter(|j| j.auto_clean)
                .filter(|j| {
                    let mut tasks = state.tasks_of(&j.id).peekable();
                    tasks.peek().is_some() && tasks.all(|t| t.status.is_terminal())
                })
                .map(|j| j.id.clone())
                .collect()
        };
        for id in &done {
            self.delete_job(id).await?;
        }
        Ok(done)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
