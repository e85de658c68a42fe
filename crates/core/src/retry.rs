// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-retry queue
//!
//! Items carry a retry counter and an error history. A failed item goes
//! back on the queue with `retries + 1`; once it has failed `max_retries`
//! retries it is dropped and reported through an aggregate `BatchError`.
//! Dropped items are also kept in a capped dead-letter list, oldest evicted
//! first, so operators can inspect what was lost. Callers pass the drain
//! time in, which stamps any dead letter the drain produces.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryItem<T> {
    pub id: String,
    pub payload: T,
    pub retries: u32,
    pub errors: Vec<String>,
}

/// An item dropped after exhausting its retries
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter<T> {
    pub item: RetryItem<T>,
    pub dropped_at: DateTime<Utc>,
}

/// Summary of one dropped item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryFailure {
    pub id: String,
    pub retries: u32,
    pub errors: Vec<String>,
}

impl fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} retries: {}",
            self.id,
            self.retries,
            self.errors.last().map(String::as_str).unwrap_or("unknown error")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} item(s) dropped after exhausting retries: {}", .failures.len(), summary(.failures))]
pub struct BatchError {
    pub failures: Vec<RetryFailure>,
}

fn summary(failures: &[RetryFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Counts from a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    pub delivered: usize,
    pub requeued: usize,
}

#[derive(Debug, Clone)]
pub struct RetryQueue<T> {
    pending: VecDeque<RetryItem<T>>,
    max_retries: u32,
    dead_letters: VecDeque<DeadLetter<T>>,
    dead_letter_capacity: usize,
}

impl<T: Clone> RetryQueue<T> {
    pub fn new(max_retries: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            max_retries,
            dead_letters: VecDeque::new(),
            dead_letter_capacity: 100,
        }
    }

    pub fn with_dead_letter_capacity(mut self, capacity: usize) -> Self {
        self.dead_letter_capacity = capacity;
        self
    }

    /// Enqueue a payload. A pending item with the same id has its payload
    /// replaced and keeps its retry history.
    pub fn push(&mut self, id: impl Into<String>, payload: T) {
        let id = id.into();
        if let Some(existing) = self.pending.iter_mut().find(|i| i.id == id) {
            existing.payload = payload;
            return;
        }
        self.pending.push_back(RetryItem {
            id,
            payload,
            retries: 0,
            errors: Vec::new(),
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &RetryItem<T>> {
        self.pending.iter()
    }

    pub fn dead_letters(&self) -> impl Iterator<Item = &DeadLetter<T>> {
        self.dead_letters.iter()
    }

    /// One pass over the items pending now. Failures are requeued for the
    /// next pass or dropped when out of retries.
    pub async fn drain<F, Fut, E>(
        &mut self,
        now: DateTime<Utc>,
        handler: F,
    ) -> Result<DrainReport, BatchError>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let (report, failures) = self.pass(now, handler).await;
        if failures.is_empty() {
            Ok(report)
        } else {
            Err(BatchError { failures })
        }
    }

    /// Repeat passes until nothing is pending; every drop is reported
    pub async fn drain_all<F, Fut, E>(
        &mut self,
        now: DateTime<Utc>,
        mut handler: F,
    ) -> Result<usize, BatchError>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let mut delivered = 0;
        let mut failures = Vec::new();
        while !self.pending.is_empty() {
            let (report, dropped) = self.pass(now, &mut handler).await;
            delivered += report.delivered;
            failures.extend(dropped);
        }
        if failures.is_empty() {
            Ok(delivered)
        } else {
            Err(BatchError { failures })
        }
    }

    async fn pass<F, Fut, E>(
        &mut self,
        now: DateTime<Utc>,
        mut handler: F,
    ) -> (DrainReport, Vec<RetryFailure>)
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let mut report = DrainReport::default();
        let mut failures = Vec::new();
        let batch: Vec<RetryItem<T>> = self.pending.drain(..).collect();

        for mut item in batch {
            match handler(item.payload.clone()).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    item.errors.push(e.to_string());
                    if item.retries < self.max_retries {
                        item.retries += 1;
                        tracing::debug!(id = %item.id, retries = item.retries, error = %e, "requeued");
                        report.requeued += 1;
                        self.pending.push_back(item);
                    } else {
                        tracing::warn!(id = %item.id, retries = item.retries, error = %e, "dropped");
                        failures.push(RetryFailure {
                            id: item.id.clone(),
                            retries: item.retries,
                            errors: item.errors.clone(),
                        });
                        self.dead_letter(item, now);
                    }
                }
            }
        }
        (report, failures)
    }

    fn dead_letter(&mut self, item: RetryItem<T>, dropped_at: DateTime<Utc>) {
        if self.dead_letter_capacity == 0 {
            return;
        }
        while self.dead_letters.len() >= self.dead_letter_capacity {
            self.dead_letters.pop_front();
        }
        self.dead_letters.push_back(DeadLetter {
            item,
            dropped_at,
        });
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
