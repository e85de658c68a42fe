// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in utility actions

use crate::action::{ActionContext, ActionImpl, ActionRegistry};
use crate::error::ActionError;
use async_trait::async_trait;
use jobs_core::{parse_iso_duration, Action, ActionMessage, ActionOutput, Job};
use serde_json::json;
use std::time::Duration;
use tracing::info;

pub const LOG_ACTION: &str = "actions.log";
pub const WAIT_ACTION: &str = "actions.wait";

/// Longest sleep between two checkpoints of `actions.wait`
const WAIT_STEP: Duration = Duration::from_millis(250);

/// Logs the message it receives and records a summary as its output
#[derive(Default)]
pub struct LogAction;

#[async_trait]
impl ActionImpl for LogAction {
    fn name(&self) -> &str {
        LOG_ACTION
    }

    async fn run(
        &self,
        ctx: &ActionContext,
        input: ActionMessage,
    ) -> Result<ActionMessage, ActionError> {
        let nodes: Vec<&str> = input.nodes.iter().map(|n| n.path.as_str()).collect();
        let users: Vec<&str> = input.users.iter().map(|u| u.login.as_str()).collect();
        let text = ctx.param("message").unwrap_or("message received");
        info!(
            job = %ctx.job_id(),
            nodes = nodes.len(),
            users = users.len(),
            "{text}"
        );
        let summary = json!({
            "message": text,
            "nodes": nodes,
            "users": users,
            "previous": input.last_output().and_then(|o| o.string_body.clone()),
        });
        let output = ActionOutput::success()
            .with_string(text)
            .with_json(summary);
        Ok(input.with_output(output))
    }
}

/// Sleeps for its `duration` parameter (ISO-8601), honouring pause and stop
#[derive(Default)]
pub struct WaitAction {
    duration: Duration,
}

#[async_trait]
impl ActionImpl for WaitAction {
    fn name(&self) -> &str {
        WAIT_ACTION
    }

    fn init(&mut self, _job: &Job, action: &Action) -> Result<(), ActionError> {
        let raw = action
            .parameters
            .get("duration")
            .ok_or_else(|| ActionError::invalid("duration", "missing"))?;
        let parsed =
            parse_iso_duration(raw).map_err(|e| ActionError::invalid("duration", e.to_string()))?;
        self.duration = parsed
            .to_std()
            .map_err(|e| ActionError::invalid("duration", e.to_string()))?;
        Ok(())
    }

    async fn run(
        &self,
        ctx: &ActionContext,
        input: ActionMessage,
    ) -> Result<ActionMessage, ActionError> {
        let total = self.duration;
        let mut waited = Duration::ZERO;
        while waited < total {
            ctx.checkpoint().await?;
            let step = (total - waited).min(WAIT_STEP);
            tokio::select! {
                _ = tokio::time::sleep(step) => {}
                _ = ctx.control().stopped() => return Err(ActionError::Stopped),
            }
            waited += step;
            ctx.progress(waited.as_secs_f32() / total.as_secs_f32());
        }
        let output = ActionOutput::success().with_string(format!("waited {}ms", total.as_millis()));
        Ok(input.with_output(output))
    }
}

/// Register `actions.log` and `actions.wait`
pub fn register_builtin(registry: &mut ActionRegistry) {
    registry.register(LOG_ACTION, || Box::new(LogAction));
    registry.register(WAIT_ACTION, || Box::new(WaitAction::default()));
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;
