// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definitions
//!
//! A Job says what to run (a tree of actions) and when (a recurring
//! schedule and/or bus event patterns). Jobs are read-only while a task
//! derived from them is running.

use crate::events::EventPattern;
use crate::id::JobId;
use crate::schedule::{RecurringSchedule, ScheduleError};
use crate::selector::{NodesSelector, Selector, UsersSelector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity under which scheduled triggers are published
pub const SYSTEM_USER: &str = "system";

/// Recurring schedule as written in the job definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// `R[n]/<start>/<duration>`
    pub iso8601: String,
}

impl Schedule {
    pub fn new(iso8601: impl Into<String>) -> Self {
        Self {
            iso8601: iso8601.into(),
        }
    }

    pub fn parse(&self) -> Result<RecurringSchedule, ScheduleError> {
        self.iso8601.parse()
    }
}

/// One step of a job; may chain into further steps
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Action {
    /// Registered implementation name, e.g. `actions.log`
    pub id: String,
    pub parameters: BTreeMap<String, String>,
    /// Replaces the message nodes with provider results
    pub nodes_selector: Option<NodesSelector>,
    pub users_selector: Option<UsersSelector>,
    /// Narrows the nodes already in the message
    pub nodes_filter: Option<NodesSelector>,
    pub users_filter: Option<UsersSelector>,
    pub chained_actions: Vec<Action>,
}

impl Action {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn then(mut self, next: Action) -> Self {
        self.chained_actions.push(next);
        self
    }

    /// Copy without chained actions, as stored in task logs
    pub fn detached(&self) -> Self {
        Self {
            chained_actions: Vec::new(),
            ..self.clone()
        }
    }

    /// Selector resolving this action's targets, if any
    pub fn selector(&self) -> Option<Selector> {
        if let Some(s) = self.nodes_selector.as_ref().filter(|s| !s.is_empty()) {
            return Some(Selector::Nodes(s.clone()));
        }
        self.users_selector
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| Selector::Users(s.clone()))
    }

    /// Filters applied to the incoming message
    pub fn filters(&self) -> Vec<Selector> {
        let mut filters = Vec::new();
        if let Some(f) = &self.nodes_filter {
            filters.push(Selector::Nodes(f.clone()));
        }
        if let Some(f) = &self.users_filter {
            filters.push(Selector::Users(f.clone()));
        }
        filters
    }

    /// Number of actions in this subtree
    pub fn count(&self) -> usize {
        1 + self.chained_actions.iter().map(Action::count).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    /// Bus event patterns that trigger this job (`node:create`, `user:*`)
    #[serde(default)]
    pub event_names: Vec<String>,
    /// Simultaneously running tasks; 0 is unlimited
    #[serde(default)]
    pub max_concurrency: u32,
    /// Trigger once as soon as the job is registered
    #[serde(default)]
    pub auto_start: bool,
    /// Delete the job once all its tasks are terminal
    #[serde(default)]
    pub auto_clean: bool,
    #[serde(default)]
    pub inactive: bool,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Job {
    pub fn new(id: impl Into<JobId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            owner: SYSTEM_USER.to_string(),
            schedule: None,
            event_names: Vec::new(),
            max_concurrency: 0,
            auto_start: false,
            auto_clean: false,
            inactive: false,
            languages: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_schedule(mut self, iso8601: impl Into<String>) -> Self {
        self.schedule = Some(Schedule::new(iso8601));
        self
    }

    pub fn with_events(mut self, names: &[&str]) -> Self {
        self.event_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_max_concurrency(mut self, max: u32) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }

    /// Does a bus event with this name trigger the job?
    pub fn listens_to(&self, event_name: &str) -> bool {
        !self.inactive
            && self
                .event_names
                .iter()
                .any(|p| EventPattern::new(p).matches(event_name))
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
