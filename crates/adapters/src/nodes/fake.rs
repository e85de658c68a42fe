// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake node provider for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use jobs_core::{Node, NodeProvider, NodeRequest, ProviderError};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Default)]
struct FakeNodeState {
    nodes: Vec<Node>,
    requests: Vec<NodeRequest>,
    fail_with: Option<String>,
}

/// In-memory tree that records every request
#[derive(Clone, Default)]
pub struct FakeNodeProvider {
    inner: Arc<Mutex<FakeNodeState>>,
}

impl FakeNodeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let fake = Self::new();
        for node in nodes {
            fake.add(node);
        }
        fake
    }

    pub fn add(&self, node: Node) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .nodes
            .push(node);
    }

    /// Make every following search fail
    pub fn fail_with(&self, message: impl Into<String>) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).fail_with = Some(message.into());
    }

    pub fn requests(&self) -> Vec<NodeRequest> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .requests
            .clone()
    }
}

#[async_trait]
impl NodeProvider for FakeNodeProvider {
    async fn search(
        &self,
        request: &NodeRequest,
        tx: mpsc::Sender<Node>,
    ) -> Result<(), ProviderError> {
        let matching = {
            let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            state.requests.push(request.clone());
            if let Some(message) = &state.fail_with {
                return Err(ProviderError::Unavailable(message.clone()));
            }
            state
                .nodes
                .iter()
                .filter(|n| request.all || request.paths.is_empty() || request.paths.contains(&n.path))
                .cloned()
                .collect::<Vec<_>>()
        };
        for node in matching {
            if tx.send(node).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
