// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the job engine
//!
//! Consumes bus events and turns them into tasks:
//! - `job:trigger` starts a task for the job (or defers it at capacity)
//! - `node:*` / `user:*` start tasks for the event-driven jobs listening
//! - `job:update` / `job:delete` keep the schedule waiters in sync
//! - `task:control` is routed to the live tasks it targets
//! - terminal `task:status` snapshots free concurrency slots

use crate::action::ActionRegistry;
use crate::concurrency::ConcurrencyGate;
use crate::delivery::StatusDelivery;
use crate::dispatcher::Dispatcher;
use crate::error::RuntimeError;
use crate::producer::EventProducer;
use crate::runnable::{launch, ExecDeps};
use crate::task::{Now, Task};
use jobs_core::{
    Clock, ControlCommand, ControlTarget, ControlVerb, Event, EventBus, EventReceiver, IdGen, Job,
    JobId, Providers, Subscription, TaskId, TaskRecord, TriggerEvent,
};
use jobs_storage::{JobFilter, JobStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runtime tuning
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Runnables executing at once
    pub workers: usize,
    /// Retries for persisting one task snapshot
    pub status_max_retries: u32,
    pub dead_letter_capacity: usize,
    /// How often failed snapshot writes are retried
    pub status_retry_interval: Duration,
    /// How long shutdown waits for background work
    pub shutdown_grace: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            status_max_retries: 3,
            dead_letter_capacity: 100,
            status_retry_interval: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Runtime collaborators
pub struct RuntimeDeps {
    pub store: Arc<dyn JobStore>,
    pub bus: EventBus,
    pub registry: ActionRegistry,
    pub providers: Providers,
}

struct LiveTask {
    task: Arc<Task>,
    /// Holds a concurrency slot (false while deferred)
    admitted: bool,
}

/// Runtime that coordinates the system
pub struct Runtime<C: Clock, I: IdGen> {
    store: Arc<dyn JobStore>,
    bus: EventBus,
    clock: C,
    id_gen: I,
    exec: ExecDeps,
    producer: EventProducer<C>,
    gate: ConcurrencyGate,
    live: Mutex<HashMap<TaskId, LiveTask>>,
    config: RuntimeConfig,
    shutdown: CancellationToken,
    dispatcher: Mutex<Option<Dispatcher>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: Clock, I: IdGen> Runtime<C, I> {
    pub fn new(deps: RuntimeDeps, clock: C, id_gen: I, config: RuntimeConfig) -> Self {
        let (dispatcher, queue) = Dispatcher::new(config.workers);
        Self {
            producer: EventProducer::new(deps.store.clone(), deps.bus.clone(), clock.clone()),
            exec: ExecDeps {
                registry: Arc::new(deps.registry),
                providers: deps.providers,
                queue,
            },
            store: deps.store,
            bus: deps.bus,
            clock,
            id_gen,
            gate: ConcurrencyGate::new(),
            live: Mutex::new(HashMap::new()),
            config,
            shutdown: CancellationToken::new(),
            dispatcher: Mutex::new(Some(dispatcher)),
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn producer(&self) -> &EventProducer<C> {
        &self.producer
    }

    fn live(&self) -> MutexGuard<'_, HashMap<TaskId, LiveTask>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscription covering every event the runtime reacts to
    pub fn subscribe(&self) -> EventReceiver {
        self.bus.subscribe(Subscription::new(
            "runtime",
            &["job:**", "node:**", "user:**", "task:**"],
        ))
    }

    /// Start the worker pool, status delivery and schedule waiters
    pub async fn start(&self) -> Result<(), RuntimeError> {
        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let mut handles = Vec::new();
        if let Some(dispatcher) = dispatcher {
            handles.push(tokio::spawn(dispatcher.run(self.shutdown.clone())));
        }
        let delivery = StatusDelivery::new(
            self.store.clone(),
            &self.bus,
            self.clock.clone(),
            self.config.status_max_retries,
            self.config.dead_letter_capacity,
            self.config.status_retry_interval,
        );
        handles.push(tokio::spawn(delivery.run(self.shutdown.clone())));
        self.background
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(handles);

        let scheduled = self.producer.start().await?;
        info!(
            workers = self.config.workers,
            scheduled,
            actions = self.exec.registry.ids().len(),
            "runtime started"
        );
        Ok(())
    }

    /// Process events until `rx` closes or shutdown begins
    pub async fn run(&self, mut rx: EventReceiver) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let name = event.name();
                    if let Err(e) = self.handle_event(event).await {
                        warn!(event = %name, error = %e, "event handling failed");
                    }
                }
            }
        }
        debug!("runtime event loop stopped");
    }

    /// Handle one incoming event
    pub async fn handle_event(&self, event: Event) -> Result<(), RuntimeError> {
        if let Some(trigger) = event.as_trigger() {
            return self.entity_changed(&event.name(), &trigger).await;
        }

        match event {
            Event::JobTrigger {
                job_id,
                trigger,
                owner,
            } => {
                self.trigger(&job_id, trigger, owner).await?;
            }

            Event::JobChanged { job_id } => match self.store.get_job(&job_id).await? {
                Some(job) => {
                    self.producer.start_or_update_job(&job)?;
                }
                None => {
                    self.producer.stop_waiter(&job_id);
                }
            },

            Event::JobDeleted { job_id } => {
                self.producer.stop_waiter(&job_id);
            }

            // Handled above
            Event::NodeChange(_) | Event::UserChange(_) => {}

            Event::TaskStatus(record) => {
                if record.status.is_terminal() {
                    self.task_ended(&record);
                }
            }

            Event::Control(command) => self.control(&command),
        }
        Ok(())
    }

    /// Start a task for every event-driven job listening to `event_name`
    async fn entity_changed(
        &self,
        event_name: &str,
        trigger: &TriggerEvent,
    ) -> Result<(), RuntimeError> {
        for job in self.store.list_jobs(JobFilter::event_driven()).await? {
            if job.listens_to(event_name) {
                debug!(job = %job.id, event = event_name, "event matched job");
                let owner = job.owner.clone();
                self.start_task(job, trigger, owner);
            }
        }
        Ok(())
    }

    /// Start (or defer) a task for a stored job
    pub async fn trigger(
        &self,
        job_id: &JobId,
        trigger: TriggerEvent,
        owner: String,
    ) -> Result<Option<TaskId>, RuntimeError> {
        let Some(job) = self.store.get_job(job_id).await? else {
            warn!(job = %job_id, "trigger for unknown job");
            return Ok(None);
        };
        Ok(self.start_task(job, &trigger, owner))
    }

    fn start_task(&self, job: Job, trigger: &TriggerEvent, owner: String) -> Option<TaskId> {
        if job.inactive {
            debug!(job = %job.id, "inactive job, trigger ignored");
            return None;
        }
        let max = job.max_concurrency;
        let clock = self.clock.clone();
        let now: Now = Arc::new(move || clock.now());
        let task = Arc::new(Task::new_from_event(
            self.id_gen.next_task_id(),
            Arc::new(job),
            trigger,
            owner,
            self.bus.clone(),
            now,
        ));
        let id = task.id();

        let admitted = self.gate.admit(&task, max);
        self.live().insert(
            id.clone(),
            LiveTask {
                task: task.clone(),
                admitted,
            },
        );
        if admitted {
            launch(&task, &self.exec);
        } else {
            info!(task = %id, job = %task.job_id(), "at max concurrency, task queued");
            task.save();
        }
        Some(id)
    }

    /// Any terminal snapshot of a tracked task frees its slot, including
    /// one written by stuck-task recovery while the task still runs
    fn task_ended(&self, record: &TaskRecord) {
        let Some(ended) = self.live().remove(&record.id) else {
            return;
        };
        ended.task.force_terminal(record);
        if !ended.admitted {
            self.gate.remove_pending(&record.job_id, &record.id);
            return;
        }
        let Some(next) = self.gate.release(&record.job_id) else {
            return;
        };
        if let Some(entry) = self.live().get_mut(&next.id()) {
            entry.admitted = true;
        }
        info!(task = %next.id(), job = %next.job_id(), "starting deferred task");
        launch(&next, &self.exec);
    }

    fn control(&self, command: &ControlCommand) {
        let targets: Vec<(Arc<Task>, bool)> = self
            .live()
            .values()
            .filter(|t| match &command.target {
                ControlTarget::Task(id) => &t.task.id() == id,
                ControlTarget::Job(id) => t.task.job_id() == id,
            })
            .map(|t| (t.task.clone(), t.admitted))
            .collect();
        if targets.is_empty() {
            debug!(target = ?command.target, "no live task for control command");
        }

        for (task, admitted) in targets {
            let applied = match (command.verb, admitted) {
                (ControlVerb::Pause, true) => task.pause(),
                (ControlVerb::Resume, true) => task.resume(),
                (ControlVerb::Stop, true) => task.stop(),
                (ControlVerb::Stop, false) => {
                    self.gate.remove_pending(task.job_id(), &task.id()).is_some()
                        && task.cancel_queued()
                }
                (_, false) => false,
            };
            info!(task = %task.id(), verb = ?command.verb, applied, "control");
        }
    }

    /// Store a job definition and announce it. An `auto_start` job is
    /// triggered once right away.
    pub async fn register_job(&self, job: Job) -> Result<(), RuntimeError> {
        if let Some(schedule) = &job.schedule {
            schedule.parse().map_err(|source| RuntimeError::Schedule {
                job_id: job.id.clone(),
                source,
            })?;
        }
        let job_id = job.id.clone();
        let auto_start = job.auto_start && !job.inactive;
        let owner = job.owner.clone();
        self.store.put_job(job).await?;
        self.bus.publish(Event::JobChanged {
            job_id: job_id.clone(),
        });
        if auto_start {
            self.run_job(&job_id, owner);
        }
        Ok(())
    }

    pub async fn delete_job(&self, job_id: &JobId) -> Result<bool, RuntimeError> {
        let existed = self.store.delete_job(job_id).await?;
        if existed {
            self.bus.publish(Event::JobDeleted {
                job_id: job_id.clone(),
            });
        }
        Ok(existed)
    }

    /// Publish a manual trigger for `job_id`
    pub fn run_job(&self, job_id: &JobId, owner: impl Into<String>) {
        self.bus.publish(Event::JobTrigger {
            job_id: job_id.clone(),
            trigger: TriggerEvent::Manual {
                job_id: job_id.clone(),
            },
            owner: owner.into(),
        });
    }

    /// Snapshot of a task still tracked by the runtime
    pub fn task(&self, id: &TaskId) -> Option<TaskRecord> {
        self.live().get(id).map(|t| t.task.snapshot())
    }

    /// Live tasks of a job, oldest first
    pub fn live_tasks(&self, job_id: &JobId) -> Vec<TaskRecord> {
        let mut tasks: Vec<TaskRecord> = self
            .live()
            .values()
            .filter(|t| t.task.job_id() == job_id)
            .map(|t| t.task.snapshot())
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    /// Stop schedules, ask live tasks to stop, then wind down the workers
    pub async fn shutdown(&self) {
        info!("runtime shutting down");
        self.producer.stop_all().await;

        let live: Vec<(Arc<Task>, bool)> = self
            .live()
            .values()
            .map(|t| (t.task.clone(), t.admitted))
            .collect();
        for (task, admitted) in live {
            if admitted {
                task.stop();
            } else {
                task.cancel_queued();
            }
        }

        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = self
            .background
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if tokio::time::timeout(self.config.shutdown_grace, handle)
                .await
                .is_err()
            {
                warn!("background task did not stop in time");
            }
        }
        info!("runtime stopped");
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
