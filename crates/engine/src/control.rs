// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative pause/resume/stop for running actions
//!
//! Nothing here preempts an action. Actions call `checkpoint()` between
//! units of work: it parks while paused and fails with `Stopped` once a
//! stop was requested. The one exception is `request_abort`, which the
//! worker pool honours by dropping in-flight runnables of a task that was
//! closed from outside.

use crate::error::ActionError;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Stopped,
}

/// Shared control state of one task; clones observe the same state
#[derive(Debug, Clone)]
pub struct ControlHandle {
    state: Arc<watch::Sender<RunState>>,
    stop: CancellationToken,
    abort: CancellationToken,
}

impl Default for ControlHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlHandle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RunState::Running);
        Self {
            state: Arc::new(state),
            stop: CancellationToken::new(),
            abort: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Running -> Paused. Returns whether the state changed.
    pub fn request_pause(&self) -> bool {
        self.state.send_if_modified(|s| {
            if *s == RunState::Running {
                *s = RunState::Paused;
                true
            } else {
                false
            }
        })
    }

    /// Paused -> Running. Returns whether the state changed.
    pub fn request_resume(&self) -> bool {
        self.state.send_if_modified(|s| {
            if *s == RunState::Paused {
                *s = RunState::Running;
                true
            } else {
                false
            }
        })
    }

    /// Final: a stopped handle never runs again. Wakes paused waiters.
    pub fn request_stop(&self) -> bool {
        let changed = self.state.send_if_modified(|s| {
            if *s == RunState::Stopped {
                false
            } else {
                *s = RunState::Stopped;
                true
            }
        });
        self.stop.cancel();
        changed
    }

    /// Stop, and drop whatever is still running without waiting for a
    /// checkpoint
    pub fn request_abort(&self) {
        self.request_stop();
        self.abort.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// Token cancelled on abort; the worker pool races runnables against it
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.state() == RunState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Token cancelled on stop; hand it to selectors and long waits
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Resolves once stop is requested
    pub async fn stopped(&self) {
        self.stop.cancelled().await
    }

    /// Park until the handle leaves the paused state
    pub async fn block_until_resume(&self) -> RunState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|s| *s != RunState::Paused).await {
            Ok(state) => *state,
            // The sender lives in `self`, so this only happens on teardown
            Err(_) => RunState::Stopped,
        };
        state
    }

    /// Safe point for an action: waits out a pause, fails on stop
    pub async fn checkpoint(&self) -> Result<(), ActionError> {
        if self.is_paused() {
            self.block_until_resume().await;
        }
        if self.is_stopped() {
            return Err(ActionError::Stopped);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
