// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persists task snapshots from the status topic
//!
//! Snapshots go through a bounded-retry queue: a failed write is retried
//! on the next flush and dropped with a logged batch error once it runs
//! out of retries. A newer snapshot of the same task replaces a pending
//! one.

use jobs_core::{
    Clock, DeadLetter, Event, EventBus, EventReceiver, RetryQueue, Subscription, TaskRecord,
    TASK_STATUS_TOPIC,
};
use jobs_storage::JobStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct StatusDelivery<C: Clock> {
    store: Arc<dyn JobStore>,
    clock: C,
    queue: RetryQueue<TaskRecord>,
    rx: EventReceiver,
    retry_interval: Duration,
}

impl<C: Clock> StatusDelivery<C> {
    /// Subscribe to the status topic now so no snapshot is missed
    pub fn new(
        store: Arc<dyn JobStore>,
        bus: &EventBus,
        clock: C,
        max_retries: u32,
        dead_letter_capacity: usize,
        retry_interval: Duration,
    ) -> Self {
        let rx = bus.subscribe(Subscription::new("status-delivery", &[TASK_STATUS_TOPIC]));
        Self {
            store,
            clock,
            queue: RetryQueue::new(max_retries).with_dead_letter_capacity(dead_letter_capacity),
            rx,
            retry_interval,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut retry = tokio::time::interval(self.retry_interval);
        retry.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = self.rx.recv() => match event {
                    Some(event) => {
                        self.accept(event);
                        while let Ok(event) = self.rx.try_recv() {
                            self.accept(event);
                        }
                        self.flush().await;
                    }
                    None => break,
                },
                _ = retry.tick() => {
                    if !self.queue.is_empty() {
                        self.flush().await;
                    }
                }
            }
        }

        while let Ok(event) = self.rx.try_recv() {
            self.accept(event);
        }
        self.flush().await;
        let dead = self.queue.dead_letters().count();
        info!(pending = self.queue.len(), dead, "status delivery stopped");
    }

    fn accept(&mut self, event: Event) {
        if let Event::TaskStatus(record) = event {
            self.queue.push(record.id.to_string(), record);
        }
    }

    /// One delivery pass over the pending snapshots
    pub async fn flush(&mut self) {
        let store = self.store.clone();
        let now = self.clock.now();
        let result = self
            .queue
            .drain(now, |record| {
                let store = store.clone();
                async move { store.put_task(record).await }
            })
            .await;
        match result {
            Ok(report) if report.requeued > 0 => {
                debug!(delivered = report.delivered, requeued = report.requeued, "status delivery retrying");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "task snapshots dropped"),
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn dead_letters(&self) -> impl Iterator<Item = &DeadLetter<TaskRecord>> {
        self.queue.dead_letters()
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
