// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User provider with no users.

use async_trait::async_trait;
use jobs_core::{ProviderError, User, UserProvider, UserRequest};
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpUserProvider;

impl NoOpUserProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UserProvider for NoOpUserProvider {
    async fn search(
        &self,
        _request: &UserRequest,
        _tx: mpsc::Sender<User>,
    ) -> Result<(), ProviderError> {
        Ok(())
    }
}
