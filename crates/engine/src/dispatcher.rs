// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool consuming runnables from a shared queue

use crate::runnable::Runnable;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sending side of the run queue; cheap to clone
#[derive(Clone)]
pub struct RunQueue {
    tx: mpsc::UnboundedSender<Runnable>,
}

impl RunQueue {
    /// Queue a runnable; after shutdown it is abandoned instead
    pub fn submit(&self, runnable: Runnable) {
        if let Err(rejected) = self.tx.send(runnable) {
            rejected.0.abandon();
        }
    }
}

/// Runs at most `workers` runnables at a time
pub struct Dispatcher {
    rx: mpsc::UnboundedReceiver<Runnable>,
    workers: usize,
}

impl Dispatcher {
    pub fn new(workers: usize) -> (Self, RunQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx,
                workers: workers.max(1),
            },
            RunQueue { tx },
        )
    }

    /// Consume the queue until `shutdown` fires, then abandon what is
    /// still queued and wait for in-flight runnables.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut running = JoinSet::new();
        info!(workers = self.workers, "dispatcher started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(result) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = result {
                        warn!(error = %e, "worker panicked");
                    }
                }
                next = self.rx.recv() => {
                    let Some(runnable) = next else { break };
                    let permit = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {
                            runnable.abandon();
                            break;
                        }
                        permit = permits.clone().acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => {
                                runnable.abandon();
                                break;
                            }
                        },
                    };
                    let abort = runnable.task().control().abort_token();
                    running.spawn(async move {
                        // Dropping the runnable releases its branch
                        tokio::select! {
                            _ = runnable.run() => {}
                            _ = abort.cancelled() => debug!("runnable dropped by abort"),
                        }
                        drop(permit);
                    });
                }
            }
        }

        self.rx.close();
        let mut abandoned = 0;
        while let Ok(runnable) = self.rx.try_recv() {
            runnable.abandon();
            abandoned += 1;
        }
        debug!(abandoned, in_flight = running.len(), "dispatcher draining");
        while let Some(result) = running.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "worker panicked");
            }
        }
        info!("dispatcher stopped");
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
