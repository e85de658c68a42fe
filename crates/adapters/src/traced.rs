// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced provider wrappers for consistent observability

use async_trait::async_trait;
use jobs_core::{
    Node, NodeProvider, NodeRequest, ProviderError, User, UserProvider, UserRequest,
};
use tokio::sync::mpsc;
use tracing::Instrument;

const PASSTHROUGH_BUFFER: usize = 32;

/// Relay items from `rx` to `tx`, counting what got through
async fn relay<T>(mut rx: mpsc::Receiver<T>, tx: mpsc::Sender<T>) -> usize {
    let mut count = 0;
    while let Some(item) = rx.recv().await {
        if tx.send(item).await.is_err() {
            break;
        }
        count += 1;
    }
    drop(rx);
    count
}

/// Wrapper that adds tracing to any NodeProvider
#[derive(Clone)]
pub struct TracedNodeProvider<P> {
    inner: P,
}

impl<P> TracedNodeProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: NodeProvider> NodeProvider for TracedNodeProvider<P> {
    async fn search(
        &self,
        request: &NodeRequest,
        tx: mpsc::Sender<Node>,
    ) -> Result<(), ProviderError> {
        let span = tracing::info_span!(
            "nodes.search",
            all = request.all,
            paths = request.paths.len(),
            query = request.query.is_some()
        );

        let (inner_tx, inner_rx) = mpsc::channel(PASSTHROUGH_BUFFER);
        let start = std::time::Instant::now();
        let (result, count) = async {
            tokio::join!(self.inner.search(request, inner_tx), relay(inner_rx, tx))
        }
        .instrument(span.clone())
        .await;
        let elapsed = start.elapsed();
        let _guard = span.enter();

        match &result {
            Ok(()) => tracing::info!(count, elapsed_ms = elapsed.as_millis() as u64, "search done"),
            Err(e) => tracing::error!(
                count,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "search failed"
            ),
        }
        result
    }
}

/// Wrapper that adds tracing to any UserProvider
#[derive(Clone)]
pub struct TracedUserProvider<P> {
    inner: P,
}

impl<P> TracedUserProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: UserProvider> UserProvider for TracedUserProvider<P> {
    async fn search(
        &self,
        request: &UserRequest,
        tx: mpsc::Sender<User>,
    ) -> Result<(), ProviderError> {
        let span = tracing::info_span!(
            "users.search",
            all = request.all,
            logins = request.logins.len(),
            query = request.query.is_some()
        );

        let (inner_tx, inner_rx) = mpsc::channel(PASSTHROUGH_BUFFER);
        let start = std::time::Instant::now();
        let (result, count) = async {
            tokio::join!(self.inner.search(request, inner_tx), relay(inner_rx, tx))
        }
        .instrument(span.clone())
        .await;
        let elapsed = start.elapsed();
        let _guard = span.enter();

        match &result {
            Ok(()) => tracing::info!(count, elapsed_ms = elapsed.as_millis() as u64, "search done"),
            Err(e) => tracing::error!(
                count,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "search failed"
            ),
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
