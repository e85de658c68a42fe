// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake user provider for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use jobs_core::{ProviderError, User, UserProvider, UserRequest};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Serves every stored user and records requests; selectors do the
/// narrowing.
#[derive(Clone, Default)]
pub struct FakeUserProvider {
    users: Arc<Mutex<Vec<User>>>,
    requests: Arc<Mutex<Vec<UserRequest>>>,
}

impl FakeUserProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let fake = Self::new();
        fake.users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(users);
        fake
    }

    pub fn requests(&self) -> Vec<UserRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl UserProvider for FakeUserProvider {
    async fn search(
        &self,
        request: &UserRequest,
        tx: mpsc::Sender<User>,
    ) -> Result<(), ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        let users = self.users.lock().unwrap_or_else(|e| e.into_inner()).clone();
        for user in users {
            if tx.send(user).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}
