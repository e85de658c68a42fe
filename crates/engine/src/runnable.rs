// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runnables: one action invocation scheduled on the worker pool
//!
//! A runnable first resolves its targets (filters, then selector). With a
//! per-entity selector it fans out into one child runnable per match;
//! otherwise it executes the action in place. A successful, non-ignored
//! output is handed to every chained action as a new runnable.

use crate::action::{ActionContext, ActionRegistry};
use crate::dispatcher::RunQueue;
use crate::error::ActionError;
use crate::task::Task;
use jobs_core::{Action, ActionMessage, ActionOutput, Entity, Providers, SelectError, Selector};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Buffer between a selector and the runnable collecting its matches
const COLLECT_BUFFER: usize = 64;

/// What every runnable needs to execute and to enqueue children
#[derive(Clone)]
pub struct ExecDeps {
    pub registry: Arc<ActionRegistry>,
    pub providers: Providers,
    pub queue: RunQueue,
}

/// One claimed unit of a task's outstanding-branch counter, released on drop
pub struct Branch {
    task: Arc<Task>,
}

impl Branch {
    pub fn claim(task: &Arc<Task>) -> Self {
        task.add(1);
        Self { task: task.clone() }
    }

    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }
}

impl Drop for Branch {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.task.mark_failed("action panicked");
        }
        self.task.done(1);
    }
}

#[derive(Clone, Copy)]
enum Stage {
    /// Apply filters and selector, then execute or fan out
    Resolve,
    /// Targets already resolved
    Execute,
}

pub struct Runnable {
    branch: Branch,
    action: Action,
    input: ActionMessage,
    stage: Stage,
    deps: ExecDeps,
}

/// Start a queued task: mark it running and queue its root actions.
/// A task without actions finishes right away.
pub fn launch(task: &Arc<Task>, deps: &ExecDeps) {
    task.set_running();
    let guard = Branch::claim(task);
    enqueue_runnables(task, &task.job().actions, task.initial_message(), deps);
    drop(guard);
}

/// Queue one runnable per action, each fed a copy of `input`
pub fn enqueue_runnables(
    task: &Arc<Task>,
    actions: &[Action],
    input: &ActionMessage,
    deps: &ExecDeps,
) {
    for action in actions {
        let runnable = Runnable::new(task, action.clone(), input.clone(), deps.clone());
        deps.queue.submit(runnable);
    }
}

impl Runnable {
    pub fn new(task: &Arc<Task>, action: Action, input: ActionMessage, deps: ExecDeps) -> Self {
        Self {
            branch: Branch::claim(task),
            action,
            input,
            stage: Stage::Resolve,
            deps,
        }
    }

    pub fn task(&self) -> &Arc<Task> {
        self.branch.task()
    }

    pub fn action_id(&self) -> &str {
        &self.action.id
    }

    /// Release the branch without running it
    pub fn abandon(self) {
        debug!(task = %self.task().id(), action = %self.action.id, "abandoning runnable");
        self.task().mark_interrupted();
    }

    /// Run to completion; the branch is released when this returns
    pub async fn run(self) {
        let span = info_span!(
            "action",
            task = %self.task().id(),
            job = %self.task().job_id(),
            action = %self.action.id,
        );
        self.execute().instrument(span).await
    }

    async fn execute(self) {
        if self.task().control().checkpoint().await.is_err() {
            debug!("stopped before start");
            self.task().mark_interrupted();
            return;
        }
        match self.stage {
            Stage::Resolve => self.resolve().await,
            Stage::Execute => {
                let input = self.input.clone();
                self.invoke(input).await
            }
        }
    }

    async fn resolve(self) {
        if !self.deps.registry.contains(&self.action.id) {
            let err = ActionError::Unresolved(self.action.id.clone());
            self.fail(&self.input, err);
            return;
        }

        let mut message = self.input.clone();
        for filter in self.action.filters() {
            message = filter.filter(&message);
            if filter.count_in(&message) == 0 {
                debug!("filter left no entity, skipping");
                let output = message.with_output(
                    ActionOutput::ignored().with_string("no entity passed the filter"),
                );
                self.task().append_log(&self.action, &self.input, &output);
                return;
            }
        }

        let Some(selector) = self.action.selector() else {
            return self.invoke(message).await;
        };
        let found = match self.select(&selector).await {
            Ok(found) => found,
            Err(SelectError::Cancelled) => {
                self.task().mark_interrupted();
                return;
            }
            Err(e) => {
                let input = message;
                self.fail(&input, e.into());
                return;
            }
        };
        if found.is_empty() {
            debug!("selector matched nothing");
            return;
        }

        if selector.multiple_selection() {
            let input = message.with_entities(&found);
            return self.invoke(input).await;
        }

        info!(matches = found.len(), "fanning out");
        for entity in &found {
            let child = Runnable {
                branch: Branch::claim(self.task()),
                action: self.action.clone(),
                input: message.with_entities(std::slice::from_ref(entity)),
                stage: Stage::Execute,
                deps: self.deps.clone(),
            };
            self.deps.queue.submit(child);
        }
    }

    async fn select(&self, selector: &Selector) -> Result<Vec<Entity>, SelectError> {
        let cancel = self.task().control().stop_token();
        let (tx, mut rx) = mpsc::channel(COLLECT_BUFFER);
        let search = async {
            let tx = tx;
            selector.select(&self.deps.providers, &cancel, &tx).await
        };
        let gather = async {
            let mut found = Vec::new();
            while let Some(entity) = rx.recv().await {
                found.push(entity);
            }
            found
        };
        let (result, found) = tokio::join!(search, gather);
        result?;
        Ok(found)
    }

    async fn invoke(self, input: ActionMessage) {
        let instance = match self.deps.registry.create(self.task().job(), &self.action) {
            Ok(instance) => instance,
            Err(e) => return self.fail(&input, e),
        };
        let ctx = ActionContext::new(self.task().clone(), self.deps.providers.clone(), &self.action);

        let start = Instant::now();
        let result = instance.run(&ctx, input.clone()).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(mut output) => {
                if output.output_chain.len() <= input.output_chain.len() {
                    output.output_chain.push(ActionOutput::success());
                }
                self.task().append_log(&self.action, &input, &output);

                let last = output
                    .last_output()
                    .cloned()
                    .unwrap_or_else(ActionOutput::success);
                info!(elapsed_ms, success = last.success, ignored = last.ignored, "action done");
                if !last.success {
                    let message = last
                        .error
                        .unwrap_or_else(|| format!("{} failed", self.action.id));
                    self.task().mark_failed(message);
                    return;
                }
                if last.ignored {
                    return;
                }
                enqueue_runnables(self.task(), &self.action.chained_actions, &output, &self.deps);
            }
            Err(ActionError::Stopped) => {
                info!(elapsed_ms, "action stopped");
                let output = input
                    .clone()
                    .with_output(ActionOutput::ignored().with_string("stopped"));
                self.task().append_log(&self.action, &input, &output);
                self.task().mark_interrupted();
            }
            Err(e) => self.fail(&input, e),
        }
    }

    fn fail(&self, input: &ActionMessage, err: ActionError) {
        warn!(error = %err, "action failed");
        let output = input
            .clone()
            .with_output(ActionOutput::failed(err.to_string()));
        self.task().append_log(&self.action, input, &output);
        self.task().mark_failed(err.to_string());
    }
}

#[cfg(test)]
#[path = "runnable_tests.rs"]
mod tests;
