// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User directory loaded from configuration

use async_trait::async_trait;
use jobs_core::{Predicate, ProviderError, User, UserProvider, UserRequest};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Fixed set of users and groups, typically from the daemon config.
///
/// Unlike remote directories this provider evaluates the request query
/// itself, so selectors receive an exact result set.
#[derive(Clone, Debug, Default)]
pub struct DirectoryUserProvider {
    users: Arc<Vec<User>>,
}

impl DirectoryUserProvider {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: Arc::new(users),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn wanted(request: &UserRequest, user: &User) -> bool {
        let listed = request.all
            || request.logins.is_empty()
            || request.logins.iter().any(|l| *l == user.login);
        listed && request.query.as_ref().is_none_or(|q| q.matches(user))
    }
}

#[async_trait]
impl UserProvider for DirectoryUserProvider {
    async fn search(
        &self,
        request: &UserRequest,
        tx: mpsc::Sender<User>,
    ) -> Result<(), ProviderError> {
        for user in self.users.iter().filter(|u| Self::wanted(request, u)) {
            if tx.send(user.clone()).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
