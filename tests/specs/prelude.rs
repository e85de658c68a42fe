// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the engine specs
//!
//! `Engine` wires a runtime over an in-memory store, fake providers and two fixture
//! actions:
//! - `fixture.step` records every input it sees
//! - `fixture.hold` parks until a permit is released, honoring pause and stop
//! - `fixture.wedge` never returns and never looks at its controls

#![allow(dead_code, unused_imports)]

pub use jobs_adapters::{FakeNodeProvider, FakeUserProvider};
pub use jobs_core::{
    Action, ActionMessage, ActionOutput, ChangeKind, ControlCommand, ControlVerb, Event, Job,
    Node, NodeChange, NodesSelector, Providers, SystemClock, TaskId, TaskRecord, TaskStatus,
};
pub use jobs_engine::maintenance::{MaintenanceConfig, FIX_STUCK_ACTION};
pub use jobs_engine::{
    register_builtin, register_maintenance, system_jobs, ActionContext, ActionError,
    ActionImpl, ActionRegistry, Runtime, RuntimeConfig, RuntimeDeps,
};
pub use jobs_storage::{JobStore, MemoryStore};
pub use std::time::Duration;

use async_trait::async_trait;
use jobs_core::SequentialIdGen;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub const STEP: &str = "fixture.step";
pub const HOLD: &str = "fixture.hold";
pub const WEDGE: &str = "fixture.wedge";

type Seen = Arc<Mutex<Vec<ActionMessage>>>;

struct Step {
    seen: Seen,
}

#[async_trait]
impl ActionImpl for Step {
    fn name(&self) -> &str {
        STEP
    }

    async fn run(
        &self,
        _ctx: &ActionContext,
        input: ActionMessage,
    ) -> Result<ActionMessage, ActionError> {
        self.seen.lock().unwrap().push(input.clone());
        Ok(input)
    }
}

struct Hold {
    permits: Arc<Semaphore>,
    entered: Arc<AtomicUsize>,
}

#[async_trait]
impl ActionImpl for Hold {
    fn name(&self) -> &str {
        HOLD
    }

    async fn run(
        &self,
        ctx: &ActionContext,
        input: ActionMessage,
    ) -> Result<ActionMessage, ActionError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        loop {
            ctx.checkpoint().await?;
            tokio::select! {
                permit = self.permits.acquire() => {
                    permit.unwrap().forget();
                    return Ok(input.with_output(ActionOutput::success().with_string("released")));
                }
                _ = ctx.control().stopped() => return Err(ActionError::Stopped),
                _ = tokio::time::sleep(Duration::from_millis(5)) => {}
            }
        }
    }
}

struct Wedge {
    entered: Arc<AtomicUsize>,
}

#[async_trait]
impl ActionImpl for Wedge {
    fn name(&self) -> &str {
        WEDGE
    }

    async fn run(
        &self,
        _ctx: &ActionContext,
        _input: ActionMessage,
    ) -> Result<ActionMessage, ActionError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

pub struct Engine {
    pub runtime: Arc<Runtime<SystemClock, SequentialIdGen>>,
    pub store: Arc<MemoryStore>,
    pub nodes: FakeNodeProvider,
    seen: Seen,
    permits: Arc<Semaphore>,
    entered: Arc<AtomicUsize>,
}

impl Engine {
    pub async fn start() -> Self {
        Self::with_nodes(Vec::new()).await
    }

    /// Engine whose node provider serves `nodes`
    pub async fn with_nodes(nodes: Vec<Node>) -> Self {
        Self::build(nodes, MaintenanceConfig::default()).await
    }

    pub async fn with_maintenance(config: MaintenanceConfig) -> Self {
        Self::build(Vec::new(), config).await
    }

    async fn build(nodes: Vec<Node>, maintenance: MaintenanceConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let bus = jobs_core::EventBus::new();
        let seen: Seen = Arc::default();
        let permits = Arc::new(Semaphore::new(0));
        let entered = Arc::new(AtomicUsize::new(0));
        let provider = FakeNodeProvider::with_nodes(nodes);

        let mut registry = ActionRegistry::default();
        register_builtin(&mut registry);
        register_maintenance(&mut registry, store.clone(), bus.clone(), &maintenance);
        {
            let seen = seen.clone();
            registry.register(STEP, move || Box::new(Step { seen: seen.clone() }));
        }
        {
            let (permits, entered) = (permits.clone(), entered.clone());
            registry.register(HOLD, move || {
                Box::new(Hold {
                    permits: permits.clone(),
                    entered: entered.clone(),
                })
            });
        }
        {
            let entered = entered.clone();
            registry.register(WEDGE, move || {
                Box::new(Wedge {
                    entered: entered.clone(),
                })
            });
        }

        let runtime = Arc::new(Runtime::new(
            RuntimeDeps {
                store: store.clone(),
                bus,
                registry,
                providers: Providers::new(provider.clone(), FakeUserProvider::new()),
            },
            SystemClock,
            SequentialIdGen::new("task"),
            RuntimeConfig {
                workers: 8,
                status_retry_interval: Duration::from_millis(10),
                shutdown_grace: Duration::from_secs(1),
                ..RuntimeConfig::default()
            },
        ));
        let rx = runtime.subscribe();
        runtime.start().await.unwrap();
        tokio::spawn({
            let runtime = runtime.clone();
            async move { runtime.run(rx).await }
        });

        Self {
            runtime,
            store,
            nodes: provider,
            seen,
            permits,
            entered,
        }
    }

    pub async fn register(&self, job: Job) {
        self.runtime.register_job(job).await.unwrap();
    }

    pub fn trigger(&self, job_id: &str) {
        self.runtime.run_job(&job_id.into(), "tester");
    }

    pub fn publish(&self, event: Event) {
        self.runtime.bus().publish(event);
    }

    pub fn control(&self, task_id: &str, verb: ControlVerb) {
        self.publish(Event::Control(ControlCommand::task(task_id, verb)));
    }

    /// Live status as the runtime sees it
    pub fn live_status(&self, task_id: &str) -> Option<TaskStatus> {
        self.runtime.task(&task_id.into()).map(|t| t.status)
    }

    /// Wait until the stored record of `task_id` has `status`
    pub async fn stored(&self, task_id: &str, status: TaskStatus) -> TaskRecord {
        let id: TaskId = task_id.into();
        let found = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(task) = self.store.get_task(&id).await.unwrap() {
                    if task.status == status {
                        return task;
                    }
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await;
        match found {
            Ok(task) => task,
            Err(_) => panic!(
                "{task_id} never reached {status}; last stored: {:?}",
                self.store.get_task(&id).await.unwrap().map(|t| t.status)
            ),
        }
    }

    pub async fn wait_live(&self, task_id: &str, status: TaskStatus) {
        wait_until(|| self.live_status(task_id) == Some(status)).await;
    }

    /// Wait until `n` holds or wedges are parked in total
    pub async fn wait_held(&self, n: usize) {
        wait_until(|| self.entered.load(Ordering::SeqCst) >= n).await;
    }

    pub fn held(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    /// Let `n` parked holds finish
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    /// Inputs seen by `fixture.step`, in call order
    pub fn seen(&self) -> Vec<ActionMessage> {
        self.seen.lock().unwrap().clone()
    }
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "condition not reached within 5s");
}

pub fn file(path: &str) -> Node {
    Node::file(path, 1, chrono::Utc::now())
}

/// Selector over every node the provider serves
pub fn every_node(collect: bool) -> NodesSelector {
    NodesSelector {
        all: true,
        collect,
        ..NodesSelector::default()
    }
}
