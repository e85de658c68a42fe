// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use fs2::FileExt;
use jobs_adapters::{
    DirectoryUserProvider, LocalNodeProvider, NoOpNodeProvider, TracedNodeProvider,
    TracedUserProvider,
};
use jobs_core::{
    Action, EventBus, EventReceiver, Job, JobId, Providers, SystemClock, TaskStatus, UuidIdGen,
};
use jobs_engine::{
    register_builtin, register_maintenance, system_jobs, ActionRegistry, Runtime, RuntimeDeps,
    RuntimeError,
};
use jobs_storage::{JobFilter, JobStore, MemoryStore, StoreError};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DaemonConfig;

/// Daemon runtime with concrete clock and id types
pub type DaemonRuntime = Runtime<SystemClock, UuidIdGen>;

/// Daemon state during operation
pub struct DaemonState {
    pub config: DaemonConfig,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub runtime: Arc<DaemonRuntime>,
    /// Runtime subscription, handed to the main loop once
    events: Option<EventReceiver>,
    /// When daemon started
    pub start_time: Instant,
}

impl DaemonState {
    /// Take the runtime's event subscription (None after the first call)
    pub fn take_events(&mut self) -> Option<EventReceiver> {
        self.events.take()
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        self.runtime.shutdown().await;

        let lock_path = self.config.lock_path();
        if lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "Daemon shutdown complete"
        );
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to read {0}: {1}")]
    ConfigRead(PathBuf, #[source] std::io::Error),

    #[error("Invalid config {0}: {1}")]
    ConfigParse(PathBuf, #[source] toml::de::Error),

    #[error("Invalid job {job_id}: {reason}")]
    InvalidJob { job_id: JobId, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Start the daemon
pub async fn startup(config: &DaemonConfig) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // The lock belongs to the running daemon
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &DaemonConfig) -> Result<DaemonState, LifecycleError> {
    // 1. Create data directory (needed for lock, store, etc.)
    std::fs::create_dir_all(&config.data_dir)?;

    // 2. Acquire lock file FIRST - prevents two daemons sharing a store
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(config.lock_path())?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Open the store, then validate jobs before anything runs
    let bus = EventBus::new();
    let store: Arc<dyn JobStore> = Arc::new(MemoryStore::open(config.store_path())?);
    let registry = build_registry(config, store.clone(), bus.clone());
    let jobs = config.load_jobs()?;
    validate_jobs(&jobs, &registry)?;

    // 4. Tasks cannot survive a restart
    reconcile_tasks(store.as_ref()).await?;

    // 5. Providers (wrapped with tracing for observability)
    let providers = build_providers(config);

    // 6. Create and start the runtime
    let runtime = Arc::new(Runtime::new(
        RuntimeDeps {
            store,
            bus,
            registry,
            providers,
        },
        SystemClock,
        UuidIdGen,
        config.runtime(),
    ));
    let events = runtime.subscribe();
    runtime.start().await?;

    // 7. Register maintenance and configured jobs
    for job in system_jobs(&config.maintenance()).into_iter().chain(jobs) {
        runtime.register_job(job).await?;
    }

    info!(data_dir = %config.data_dir.display(), "Daemon started");

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        runtime,
        events: Some(events),
        start_time: Instant::now(),
    })
}

/// Validate the config and jobs file without starting anything.
/// Returns how many jobs the file defines.
pub fn check(config: &DaemonConfig) -> Result<usize, LifecycleError> {
    let store: Arc<dyn JobStore> = Arc::new(MemoryStore::new());
    let registry = build_registry(config, store, EventBus::new());
    let jobs = config.load_jobs()?;
    validate_jobs(&system_jobs(&config.maintenance()), &registry)?;
    validate_jobs(&jobs, &registry)?;
    Ok(jobs.len())
}

fn build_registry(config: &DaemonConfig, store: Arc<dyn JobStore>, bus: EventBus) -> ActionRegistry {
    let mut registry = ActionRegistry::default();
    register_builtin(&mut registry);
    register_maintenance(&mut registry, store, bus, &config.maintenance());
    registry
}

fn build_providers(config: &DaemonConfig) -> Providers {
    let users = TracedUserProvider::new(DirectoryUserProvider::new(config.users.clone()));
    match &config.nodes_root {
        Some(root) => Providers::new(TracedNodeProvider::new(LocalNodeProvider::new(root.clone())), users),
        None => Providers::new(TracedNodeProvider::new(NoOpNodeProvider::new()), users),
    }
}

/// Every schedule parses and every action id is registered
pub fn validate_jobs(jobs: &[Job], registry: &ActionRegistry) -> Result<(), LifecycleError> {
    fn unknown_action<'a>(actions: &'a [Action], registry: &ActionRegistry) -> Option<&'a str> {
        actions.iter().find_map(|action| {
            if registry.contains(&action.id) {
                unknown_action(&action.chained_actions, registry)
            } else {
                Some(action.id.as_str())
            }
        })
    }

    for job in jobs {
        if let Some(schedule) = &job.schedule {
            schedule
                .parse()
                .map_err(|e| LifecycleError::InvalidJob {
                    job_id: job.id.clone(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(id) = unknown_action(&job.actions, registry) {
            return Err(LifecycleError::InvalidJob {
                job_id: job.id.clone(),
                reason: format!("unknown action {id:?}"),
            });
        }
    }
    Ok(())
}

/// Mark tasks left live by a previous run as interrupted
async fn reconcile_tasks(store: &dyn JobStore) -> Result<(), LifecycleError> {
    let live = [TaskStatus::Queued, TaskStatus::Running, TaskStatus::Paused];
    let filter = JobFilter {
        include_inactive: true,
        ..JobFilter::default()
    };
    let mut count = 0;
    for job in store.list_jobs(filter).await? {
        for mut task in store.list_tasks(&job.id, &live).await? {
            warn!(task = %task.id, job = %job.id, status = %task.status, "interrupting task from previous run");
            task.status = TaskStatus::Interrupted;
            task.status_message = "interrupted: daemon restarted".to_string();
            task.end_time = Some(Utc::now());
            task.can_pause = false;
            task.can_stop = false;
            store.put_task(task).await?;
            count += 1;
        }
    }
    if count > 0 {
        warn!(count, "Found in-progress tasks from previous session");
    }
    Ok(())
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &DaemonConfig) {
    let lock_path = config.lock_path();
    if lock_path.exists() {
        let _ = std::fs::remove_file(&lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
