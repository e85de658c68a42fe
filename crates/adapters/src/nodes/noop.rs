// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node provider with an empty tree.

use async_trait::async_trait;
use jobs_core::{Node, NodeProvider, NodeRequest, ProviderError};
use tokio::sync::mpsc;

/// Finds nothing. Used when no tree is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpNodeProvider;

impl NoOpNodeProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NodeProvider for NoOpNodeProvider {
    async fn search(
        &self,
        _request: &NodeRequest,
        _tx: mpsc::Sender<Node>,
    ) -> Result<(), ProviderError> {
        Ok(())
    }
}
