// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule-driven triggers
//!
//! One `ScheduleWaiter` per scheduled job sleeps until the next
//! occurrence and reports it. The `EventProducer` owns the waiters and
//! republishes what they report as `job:trigger` events under the system
//! identity.

use crate::error::RuntimeError;
use chrono::{DateTime, Utc};
use jobs_core::{
    Clock, Event, EventBus, Job, JobId, RecurringSchedule, TriggerEvent, SYSTEM_USER,
};
use jobs_storage::{JobFilter, JobStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One occurrence reported by a waiter
#[derive(Debug, Clone, PartialEq)]
pub struct Fired {
    pub job_id: JobId,
    pub at: DateTime<Utc>,
}

/// Sleeps from one occurrence of a schedule to the next
pub struct ScheduleWaiter<C: Clock> {
    job_id: JobId,
    schedule: RecurringSchedule,
    clock: C,
    tx: mpsc::UnboundedSender<Fired>,
    stop: CancellationToken,
}

impl<C: Clock> ScheduleWaiter<C> {
    pub fn new(
        job_id: JobId,
        schedule: RecurringSchedule,
        clock: C,
        tx: mpsc::UnboundedSender<Fired>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            job_id,
            schedule,
            clock,
            tx,
            stop,
        }
    }

    /// Time until the next occurrence, `None` once exhausted
    pub fn next_wait(&self) -> Option<chrono::Duration> {
        self.schedule.next_wait(self.clock.now())
    }

    /// Fire at each occurrence until stopped or exhausted
    pub async fn run(self) {
        let mut after = self.clock.now();
        loop {
            let Some(at) = self.schedule.next_occurrence(after) else {
                info!(job = %self.job_id, "schedule exhausted");
                break;
            };
            let wait = (at - self.clock.now()).to_std().unwrap_or_default();
            debug!(job = %self.job_id, %at, wait_ms = wait.as_millis() as u64, "waiting");

            tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
            let late = self.clock.now() - at;
            // Stopped while waking up: the job may be gone or replaced
            if self.stop.is_cancelled() {
                break;
            }
            debug!(job = %self.job_id, %at, late_ms = late.num_milliseconds(), "firing");

            let fired = Fired {
                job_id: self.job_id.clone(),
                at,
            };
            if self.tx.send(fired).is_err() {
                break;
            }
            // Next occurrence strictly after this one, even if the
            // sleep ended a little early by the wall clock
            after = at.max(self.clock.now());
        }
        debug!(job = %self.job_id, "waiter stopped");
    }
}

struct WaiterHandle {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the schedule waiters and forwards their triggers to the bus
pub struct EventProducer<C: Clock> {
    store: Arc<dyn JobStore>,
    bus: EventBus,
    clock: C,
    tx: mpsc::UnboundedSender<Fired>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Fired>>>,
    waiters: Mutex<HashMap<JobId, WaiterHandle>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    forward_stop: CancellationToken,
}

impl<C: Clock> EventProducer<C> {
    pub fn new(store: Arc<dyn JobStore>, bus: EventBus, clock: C) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            store,
            bus,
            clock,
            tx,
            rx: Mutex::new(Some(rx)),
            waiters: Mutex::new(HashMap::new()),
            forwarder: Mutex::new(None),
            forward_stop: CancellationToken::new(),
        }
    }

    /// Start forwarding and one waiter per scheduled job. Jobs with a bad
    /// schedule are logged and skipped. Returns how many waiters started.
    pub async fn start(&self) -> Result<usize, RuntimeError> {
        self.spawn_forwarder();
        let jobs = self.store.list_jobs(JobFilter::scheduled()).await?;
        let mut started = 0;
        for job in &jobs {
            match self.start_or_update_job(job) {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "schedule not started"),
            }
        }
        info!(started, "event producer started");
        Ok(started)
    }

    fn spawn_forwarder(&self) {
        let Some(mut rx) = self.rx.lock().unwrap_or_else(|e| e.into_inner()).take() else {
            return;
        };
        let bus = self.bus.clone();
        let stop = self.forward_stop.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    fired = rx.recv() => match fired {
                        Some(fired) => publish_trigger(&bus, fired),
                        None => break,
                    },
                    _ = stop.cancelled() => {
                        // Waiters are stopped by now; flush what they sent
                        while let Ok(fired) = rx.try_recv() {
                            publish_trigger(&bus, fired);
                        }
                        break;
                    }
                }
            }
            debug!("trigger forwarder stopped");
        });
        *self.forwarder.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Replace the waiter of `job`. Returns whether a waiter now runs:
    /// inactive or unscheduled jobs get none.
    pub fn start_or_update_job(&self, job: &Job) -> Result<bool, RuntimeError> {
        self.stop_waiter(&job.id);
        let Some(schedule) = &job.schedule else {
            return Ok(false);
        };
        if job.inactive {
            debug!(job = %job.id, "inactive, not scheduling");
            return Ok(false);
        }
        let parsed = schedule.parse().map_err(|source| RuntimeError::Schedule {
            job_id: job.id.clone(),
            source,
        })?;

        let stop = CancellationToken::new();
        let waiter = ScheduleWaiter::new(
            job.id.clone(),
            parsed,
            self.clock.clone(),
            self.tx.clone(),
            stop.clone(),
        );
        if let Some(wait) = waiter.next_wait() {
            info!(job = %job.id, next_in_ms = wait.num_milliseconds(), "scheduled");
        }
        let handle = tokio::spawn(waiter.run());
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job.id.clone(), WaiterHandle { stop, handle });
        Ok(true)
    }

    pub fn stop_waiter(&self, job_id: &JobId) -> bool {
        let removed = self
            .waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(job_id);
        match removed {
            Some(waiter) => {
                waiter.stop.cancel();
                debug!(job = %job_id, "waiter stopped");
                true
            }
            None => false,
        }
    }

    /// Stop every waiter, then the forwarder once they are done
    pub async fn stop_all(&self) {
        let waiters: Vec<WaiterHandle> = self
            .waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, w)| w)
            .collect();
        for waiter in &waiters {
            waiter.stop.cancel();
        }
        for waiter in waiters {
            if let Err(e) = waiter.handle.await {
                warn!(error = %e, "waiter task failed");
            }
        }

        self.forward_stop.cancel();
        let forwarder = self
            .forwarder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = forwarder {
            if let Err(e) = handle.await {
                warn!(error = %e, "forwarder task failed");
            }
        }
    }

    /// Jobs with a live waiter, sorted
    pub fn scheduled_jobs(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self
            .waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

fn publish_trigger(bus: &EventBus, fired: Fired) {
    debug!(job = %fired.job_id, at = %fired.at, "schedule fired");
    bus.publish(Event::JobTrigger {
        job_id: fired.job_id.clone(),
        trigger: TriggerEvent::Schedule {
            job_id: fired.job_id,
            fired_at: fired.at,
        },
        owner: SYSTEM_USER.to_string(),
    });
}

#[cfg(test)]
#[path = "producer_tests.rs"]
mod tests;
