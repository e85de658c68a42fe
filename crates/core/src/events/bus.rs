// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus routing events to subscribers

use super::subscription::{SubscriberId, Subscription};
use crate::event::Event;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Multi-producer, multi-consumer bus. Cloning shares the subscriber table.
///
/// Subscribers get unbounded channels so publishers never wait on slow
/// consumers; subscribers whose receiver was dropped are pruned on publish.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<SubscriberId, (Subscription, EventSender)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe; an existing subscription with the same id is replaced
    pub fn subscribe(&self, subscription: Subscription) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.insert(subscription.id.clone(), (subscription, tx));
        rx
    }

    pub fn unsubscribe(&self, id: &SubscriberId) {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.remove(id);
    }

    /// Publish to every matching subscriber; returns how many received it
    pub fn publish(&self, event: Event) -> usize {
        let name = event.name();
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            for (id, (subscription, tx)) in subs.iter() {
                if !subscription.matches(&name) {
                    continue;
                }
                if tx.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(id.clone());
                }
            }
        }
        if !closed.is_empty() {
            let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
            for id in &closed {
                tracing::debug!(subscriber = %id.0, "dropping closed subscriber");
                subs.remove(id);
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
