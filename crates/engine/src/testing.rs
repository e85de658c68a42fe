// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine unit tests

use crate::action::{ActionContext, ActionImpl, ActionRegistry};
use crate::dispatcher::Dispatcher;
use crate::error::ActionError;
use crate::runnable::{launch, ExecDeps};
use crate::task::Task;
use async_trait::async_trait;
use jobs_adapters::{FakeNodeProvider, FakeUserProvider};
use jobs_core::{
    ActionMessage, ActionOutput, EventBus, Job, Providers, TaskRecord, TaskStatus, TriggerEvent,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// (action id, input) of every recorded invocation
pub(crate) type Calls = Arc<Mutex<Vec<(String, ActionMessage)>>>;

/// Records its input; answers with the `say` parameter
pub(crate) struct Record {
    id: String,
    calls: Calls,
}

#[async_trait]
impl ActionImpl for Record {
    fn name(&self) -> &str {
        &self.id
    }

    async fn run(
        &self,
        ctx: &ActionContext,
        input: ActionMessage,
    ) -> Result<ActionMessage, ActionError> {
        self.calls
            .lock()
            .unwrap()
            .push((self.id.clone(), input.clone()));
        let mut output = ActionOutput::success();
        if let Some(say) = ctx.param("say") {
            output = output.with_string(say);
        }
        Ok(input.with_output(output))
    }
}

struct Fail;

#[async_trait]
impl ActionImpl for Fail {
    fn name(&self) -> &str {
        "test.fail"
    }

    async fn run(&self, _: &ActionContext, _: ActionMessage) -> Result<ActionMessage, ActionError> {
        Err(ActionError::Failed("boom".into()))
    }
}

struct Ignore;

#[async_trait]
impl ActionImpl for Ignore {
    fn name(&self) -> &str {
        "test.ignore"
    }

    async fn run(
        &self,
        _: &ActionContext,
        input: ActionMessage,
    ) -> Result<ActionMessage, ActionError> {
        Ok(input.with_output(ActionOutput::ignored()))
    }
}

/// Waits for a permit from `gate`, honouring pause and stop
struct Block {
    gate: Arc<Semaphore>,
    entered: Arc<AtomicUsize>,
}

#[async_trait]
impl ActionImpl for Block {
    fn name(&self) -> &str {
        "test.block"
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
                permit = self.gate.acquire() => {
                    if let Ok(permit) = permit {
                        permit.forget();
                    }
                    break;
                }
                _ = ctx.control().stopped() => return Err(ActionError::Stopped),
                _ = tokio::time::sleep(Duration::from_millis(5)) => {}
            }
        }
        Ok(input)
    }
}

/// Never returns and never checks its controls
struct Wedge {
    entered: Arc<AtomicUsize>,
}

#[async_trait]
impl ActionImpl for Wedge {
    fn name(&self) -> &str {
        "test.wedge"
    }

    async fn run(&self, _: &ActionContext, _: ActionMessage) -> Result<ActionMessage, ActionError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

pub(crate) struct Harness {
    pub bus: EventBus,
    pub deps: ExecDeps,
    pub calls: Calls,
    pub gate: Arc<Semaphore>,
    pub entered: Arc<AtomicUsize>,
    pub shutdown: CancellationToken,
}

impl Harness {
    pub fn new(nodes: FakeNodeProvider, users: FakeUserProvider) -> Self {
        Self::build(nodes, users, |_, _| {})
    }

    /// Test actions plus whatever `extend` registers
    pub fn with_actions(extend: impl FnOnce(&mut ActionRegistry, &EventBus)) -> Self {
        Self::build(FakeNodeProvider::new(), FakeUserProvider::new(), extend)
    }

    fn build(
        nodes: FakeNodeProvider,
        users: FakeUserProvider,
        extend: impl FnOnce(&mut ActionRegistry, &EventBus),
    ) -> Self {
        let bus = EventBus::new();
        let calls: Calls = Arc::default();
        let gate = Arc::new(Semaphore::new(0));
        let entered = Arc::new(AtomicUsize::new(0));
        let mut registry = test_registry(&calls, &gate, &entered);
        extend(&mut registry, &bus);

        let (dispatcher, queue) = Dispatcher::new(4);
        let shutdown = CancellationToken::new();
        tokio::spawn(dispatcher.run(shutdown.clone()));

        Self {
            bus,
            deps: ExecDeps {
                registry: Arc::new(registry),
                providers: Providers::new(nodes, users),
                queue,
            },
            calls,
            gate,
            entered,
            shutdown,
        }
    }

    pub fn empty() -> Self {
        Self::new(FakeNodeProvider::new(), FakeUserProvider::new())
    }

    pub fn task(&self, job: Job) -> Arc<Task> {
        self.task_with_trigger(job, None)
    }

    pub fn task_with_trigger(&self, job: Job, trigger: Option<TriggerEvent>) -> Arc<Task> {
        let trigger = trigger.unwrap_or(TriggerEvent::Manual {
            job_id: job.id.clone(),
        });
        Arc::new(Task::new_from_event(
            format!("task-{}", job.id).into(),
            Arc::new(job),
            &trigger,
            "tester",
            self.bus.clone(),
            Arc::new(chrono::Utc::now),
        ))
    }

    pub fn launch(&self, task: &Arc<Task>) {
        launch(task, &self.deps);
    }

    /// Launch and wait for a terminal status
    pub async fn run(&self, job: Job) -> TaskRecord {
        let task = self.task(job);
        self.launch(&task);
        wait_terminal(&task).await
    }

    pub fn calls(&self) -> Vec<(String, ActionMessage)> {
        self.calls.lock().unwrap().clone()
    }

    pub async fn wait_entered(&self, n: usize) {
        wait_until(|| self.entered.load(Ordering::SeqCst) >= n).await;
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub(crate) fn test_registry(
    calls: &Calls,
    gate: &Arc<Semaphore>,
    entered: &Arc<AtomicUsize>,
) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    for id in ["test.a", "test.b", "test.c"] {
        let calls = calls.clone();
        registry.register(id, move || {
            Box::new(Record {
                id: id.to_string(),
                calls: calls.clone(),
            })
        });
    }
    registry.register("test.fail", || Box::new(Fail));
    registry.register("test.ignore", || Box::new(Ignore));
    {
        let entered = entered.clone();
        registry.register("test.wedge", move || {
            Box::new(Wedge {
                entered: entered.clone(),
            })
        });
    }
    let (gate, entered) = (gate.clone(), entered.clone());
    registry.register("test.block", move || {
        Box::new(Block {
            gate: gate.clone(),
            entered: entered.clone(),
        })
    });
    registry
}

pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap();
}

pub(crate) async fn wait_terminal(task: &Task) -> TaskRecord {
    wait_until(|| task.status().is_terminal()).await;
    task.snapshot()
}

pub(crate) async fn wait_status(task: &Task, status: TaskStatus) {
    wait_until(|| task.status() == status).await;
}
