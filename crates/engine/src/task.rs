// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task state machine
//!
//! A task is one run of a job. Every branch of its action tree holds one
//! unit of the outstanding-branch counter; the task only reaches a
//! terminal status when the last unit is released.

use crate::control::ControlHandle;
use chrono::{DateTime, Utc};
use jobs_core::{
    Action, ActionLog, ActionMessage, Event, EventBus, Job, JobId, TaskId, TaskRecord, TaskStatus,
    TriggerEvent,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Wall-clock source shared by the task and its actions
pub type Now = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct Task {
    record: Mutex<TaskRecord>,
    rc: AtomicUsize,
    failed: AtomicBool,
    interrupted: AtomicBool,
    job: Arc<Job>,
    initial: ActionMessage,
    control: ControlHandle,
    bus: EventBus,
    now: Now,
}

impl Task {
    /// Build a queued task for `job` from whatever triggered it
    pub fn new_from_event(
        id: TaskId,
        job: Arc<Job>,
        trigger: &TriggerEvent,
        owner: impl Into<String>,
        bus: EventBus,
        now: Now,
    ) -> Self {
        let record = TaskRecord::new(id, job.id.clone(), owner);
        Self {
            record: Mutex::new(record),
            rc: AtomicUsize::new(0),
            failed: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            initial: ActionMessage::from_trigger(trigger),
            job,
            control: ControlHandle::new(),
            bus,
            now,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskRecord> {
        self.record.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> TaskId {
        self.lock().id.clone()
    }

    pub fn job_id(&self) -> &JobId {
        &self.job.id
    }

    pub fn job(&self) -> &Arc<Job> {
        &self.job
    }

    pub fn initial_message(&self) -> &ActionMessage {
        &self.initial
    }

    pub fn control(&self) -> &ControlHandle {
        &self.control
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now)()
    }

    pub(crate) fn clock(&self) -> Now {
        self.now.clone()
    }

    pub fn status(&self) -> TaskStatus {
        self.lock().status
    }

    /// Outstanding branches
    pub fn rc(&self) -> usize {
        self.rc.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> TaskRecord {
        self.lock().clone()
    }

    /// Publish the current snapshot on the status topic
    pub fn save(&self) {
        let snapshot = self.snapshot();
        self.bus.publish(Event::TaskStatus(snapshot));
    }

    /// Claim `n` outstanding branches
    pub fn add(&self, n: usize) {
        self.rc.fetch_add(n, Ordering::SeqCst);
    }

    /// Release `n` branches; the task finalizes when none remain
    pub fn done(&self, n: usize) {
        let previous = match self
            .rc
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |rc| {
                Some(rc.saturating_sub(n))
            }) {
            Ok(prev) | Err(prev) => prev,
        };
        if previous < n {
            warn!(task = %self.id(), rc = previous, n, "released more branches than claimed");
        }
        if previous > 0 && previous <= n {
            self.finalize();
        }
    }

    /// Request a status. Terminal statuses are only honoured with no
    /// outstanding branch; a terminal task never changes again.
    pub fn set_status(&self, status: TaskStatus) -> bool {
        if status.is_terminal() && self.rc() > 0 {
            debug!(task = %self.id(), %status, rc = self.rc(), "branches outstanding, keeping status");
            return false;
        }
        {
            let mut record = self.lock();
            if record.status.is_terminal() || record.status == status {
                return false;
            }
            record.status = status;
            if status.is_terminal() {
                record.end_time = Some(self.now());
                record.can_pause = false;
                record.can_stop = false;
            }
        }
        self.save();
        true
    }

    pub fn set_running(&self) {
        {
            let mut record = self.lock();
            if record.status != TaskStatus::Queued {
                return;
            }
            record.status = TaskStatus::Running;
            record.start_time = Some(self.now());
        }
        info!(task = %self.id(), job = %self.job.id, "task started");
        self.save();
    }

    /// Pause request from the control topic
    pub fn pause(&self) -> bool {
        if self.status() != TaskStatus::Running || !self.control.request_pause() {
            return false;
        }
        self.set_status(TaskStatus::Paused)
    }

    pub fn resume(&self) -> bool {
        if !self.control.request_resume() {
            return false;
        }
        self.set_status(TaskStatus::Running)
    }

    /// Ask every branch to stop at its next checkpoint
    pub fn stop(&self) -> bool {
        if self.status().is_terminal() {
            return false;
        }
        self.control.request_stop()
    }

    /// Close a task that never started
    pub fn cancel_queued(&self) -> bool {
        if self.status() != TaskStatus::Queued || self.rc() > 0 {
            return false;
        }
        self.control.request_stop();
        self.mark_interrupted();
        self.finalize();
        true
    }

    /// Adopt a terminal status decided outside the task (stuck-task
    /// recovery). Outstanding branches are aborted rather than awaited.
    pub fn force_terminal(&self, ended: &TaskRecord) -> bool {
        if !ended.status.is_terminal() {
            return false;
        }
        {
            let mut record = self.lock();
            if record.status.is_terminal() {
                return false;
            }
            record.status = ended.status;
            record.end_time = ended.end_time.or_else(|| Some(self.now()));
            record.status_message = ended.status_message.clone();
            record.can_pause = false;
            record.can_stop = false;
        }
        self.control.request_abort();
        warn!(task = %self.id(), status = %ended.status, rc = self.rc(), "task closed from outside");
        self.save();
        true
    }

    /// Some branch failed; the task ends in `Error`
    pub fn mark_failed(&self, message: impl Into<String>) {
        self.failed.store(true, Ordering::SeqCst);
        self.lock().status_message = message.into();
    }

    /// Some branch stopped on request
    pub fn mark_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn set_progress(&self, progress: f32) {
        self.lock().progress = progress.clamp(0.0, 1.0);
        self.save();
    }

    pub fn set_status_message(&self, message: impl Into<String>) {
        self.lock().status_message = message.into();
        self.save();
    }

    /// Record one action invocation. The stored action loses its chained
    /// actions and the stored output keeps only its last chain entry; the
    /// arguments are left untouched.
    pub fn append_log(&self, action: &Action, input: &ActionMessage, output: &ActionMessage) {
        let mut stored_output = output.clone();
        let last = stored_output.output_chain.pop();
        stored_output.output_chain = last.into_iter().collect();

        let entry = ActionLog {
            action: action.detached(),
            input: input.clone(),
            output: stored_output,
        };
        self.lock().actions_logs.push(entry);
        self.save();
    }

    fn finalize(&self) {
        let status = if self.failed.load(Ordering::SeqCst) {
            TaskStatus::Error
        } else if self.interrupted.load(Ordering::SeqCst) || self.control.is_stopped() {
            TaskStatus::Interrupted
        } else {
            TaskStatus::Finished
        };
        {
            let mut record = self.lock();
            if status == TaskStatus::Finished {
                record.progress = 1.0;
            }
        }
        if self.set_status(status) {
            info!(task = %self.id(), job = %self.job.id, %status, "task ended");
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
