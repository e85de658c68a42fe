// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action implementations and their registry

use crate::control::ControlHandle;
use crate::error::ActionError;
use crate::task::Task;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobs_core::{Action, ActionMessage, Job, JobId, Providers, TaskId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A concrete action body.
///
/// A fresh instance is created and initialised for every invocation.
/// `run` receives the input message by value and returns the output
/// message; appending an `ActionOutput` is optional, a plain success is
/// recorded when nothing was appended.
#[async_trait]
pub trait ActionImpl: Send + Sync {
    fn name(&self) -> &str;

    /// Validate parameters before running
    fn init(&mut self, _job: &Job, _action: &Action) -> Result<(), ActionError> {
        Ok(())
    }

    async fn run(
        &self,
        ctx: &ActionContext,
        input: ActionMessage,
    ) -> Result<ActionMessage, ActionError>;
}

pub type ActionFactory = Arc<dyn Fn() -> Box<dyn ActionImpl> + Send + Sync>;

/// Maps action ids to factories; filled at startup, read at dispatch
#[derive(Clone, Default)]
pub struct ActionRegistry {
    factories: HashMap<String, ActionFactory>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn ActionImpl> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Instantiate and initialise the implementation behind `action.id`
    pub fn create(&self, job: &Job, action: &Action) -> Result<Box<dyn ActionImpl>, ActionError> {
        let factory = self
            .factories
            .get(&action.id)
            .ok_or_else(|| ActionError::Unresolved(action.id.clone()))?;
        let mut instance = factory();
        instance.init(job, action)?;
        Ok(instance)
    }
}

/// What a running action can see and report through
pub struct ActionContext {
    task: Arc<Task>,
    providers: Providers,
    parameters: BTreeMap<String, String>,
}

impl ActionContext {
    pub(crate) fn new(task: Arc<Task>, providers: Providers, action: &Action) -> Self {
        Self {
            task,
            providers,
            parameters: action.parameters.clone(),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    pub fn job_id(&self) -> &JobId {
        self.task.job_id()
    }

    pub fn job(&self) -> &Job {
        self.task.job()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn control(&self) -> &ControlHandle {
        self.task.control()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.task.now()
    }

    /// See [`ControlHandle::checkpoint`]
    pub async fn checkpoint(&self) -> Result<(), ActionError> {
        self.task.control().checkpoint().await
    }

    pub fn progress(&self, progress: f32) {
        self.task.set_progress(progress);
    }

    pub fn status_message(&self, message: impl Into<String>) {
        self.task.set_status_message(message);
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
