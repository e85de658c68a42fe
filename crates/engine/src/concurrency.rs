// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job MaxConcurrency gating
//!
//! Triggers arriving while a job is at capacity are deferred, never
//! dropped, and start in arrival order as running tasks end.

use crate::task::Task;
use jobs_core::{JobId, TaskId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct JobSlots {
    running: usize,
    /// 0 is unlimited
    max: u32,
    pending: VecDeque<Arc<Task>>,
}

impl JobSlots {
    fn has_room(&self) -> bool {
        self.max == 0 || self.running < self.max as usize
    }
}

#[derive(Default)]
pub struct ConcurrencyGate {
    jobs: Mutex<HashMap<JobId, JobSlots>>,
}

impl ConcurrencyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a slot for `task` or queue it. Returns true if it may start now.
    pub fn admit(&self, task: &Arc<Task>, max_concurrency: u32) -> bool {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let slots = jobs.entry(task.job_id().clone()).or_default();
        slots.max = max_concurrency;
        if slots.pending.is_empty() && slots.has_room() {
            slots.running += 1;
            true
        } else {
            slots.pending.push_back(task.clone());
            false
        }
    }

    /// Give back a slot; returns the next deferred task, which now holds it
    pub fn release(&self, job_id: &JobId) -> Option<Arc<Task>> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let slots = jobs.get_mut(job_id)?;
        slots.running = slots.running.saturating_sub(1);
        let next = if slots.has_room() {
            slots.pending.pop_front()
        } else {
            None
        };
        if next.is_some() {
            slots.running += 1;
        }
        if slots.running == 0 && slots.pending.is_empty() {
            jobs.remove(job_id);
        }
        next
    }

    /// Drop a deferred task from the queue
    pub fn remove_pending(&self, job_id: &JobId, task_id: &TaskId) -> Option<Arc<Task>> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let slots = jobs.get_mut(job_id)?;
        let index = slots.pending.iter().position(|t| &t.id() == task_id)?;
        let task = slots.pending.remove(index);
        if slots.running == 0 && slots.pending.is_empty() {
            jobs.remove(job_id);
        }
        task
    }

    pub fn running(&self, job_id: &JobId) -> usize {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.get(job_id).map_or(0, |s| s.running)
    }

    pub fn pending(&self, job_id: &JobId) -> usize {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.get(job_id).map_or(0, |s| s.pending.len())
    }
}

#[cfg(test)]
#[path = "concurrency_tests.rs"]
mod tests;
