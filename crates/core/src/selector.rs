// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Selectors resolve or filter the entities an action operates on
//!
//! `select` streams candidates from a provider; `filter` narrows the
//! entities already carried by a message. Both share the same query.

use crate::message::{ActionMessage, Entity, Node, User};
use crate::provider::{
    NodeProvider, NodeRequest, ProviderError, Providers, UserProvider, UserRequest,
};
use crate::query::{NodeQuery, Predicate, Query, UserQuery};
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Buffer between a provider and its selector
const SELECT_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("selection cancelled")]
    Cancelled,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Selects or filters tree nodes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodesSelector {
    pub all: bool,
    pub paths: Vec<String>,
    pub query: Option<Query<NodeQuery>>,
    /// Run once with every match instead of once per match
    pub collect: bool,
}

impl NodesSelector {
    /// Nothing to look up
    pub fn is_empty(&self) -> bool {
        !self.all && self.paths.is_empty() && self.query.is_none()
    }

    pub fn multiple_selection(&self) -> bool {
        self.collect
    }

    fn accepts(&self, node: &Node) -> bool {
        self.query.as_ref().is_none_or(|q| q.matches(node))
    }

    /// Stream matching nodes into `tx`; returns how many were sent
    pub async fn select(
        &self,
        provider: &dyn NodeProvider,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<Entity>,
    ) -> Result<usize, SelectError> {
        if self.is_empty() {
            return Ok(0);
        }
        let request = NodeRequest {
            all: self.all,
            paths: self.paths.clone(),
            query: self.query.clone(),
        };
        let (found_tx, found_rx) = mpsc::channel(SELECT_BUFFER);
        forward(
            provider.search(&request, found_tx),
            found_rx,
            |n| self.accepts(n),
            Entity::Node,
            cancel,
            tx,
        )
        .await
    }

    /// Copy of `message` keeping only nodes accepted by the query
    pub fn filter(&self, message: &ActionMessage) -> ActionMessage {
        let Some(query) = &self.query else {
            return message.clone();
        };
        ActionMessage {
            nodes: message
                .nodes
                .iter()
                .filter(|n| query.matches(*n))
                .cloned()
                .collect(),
            ..message.clone()
        }
    }
}

/// Selects or filters users and groups
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersSelector {
    pub all: bool,
    pub logins: Vec<String>,
    pub query: Option<Query<UserQuery>>,
    pub collect: bool,
}

impl UsersSelector {
    pub fn is_empty(&self) -> bool {
        !self.all && self.logins.is_empty() && self.query.is_none()
    }

    pub fn multiple_selection(&self) -> bool {
        self.collect
    }

    fn accepts(&self, user: &User) -> bool {
        self.query.as_ref().is_none_or(|q| q.matches(user))
    }

    pub async fn select(
        &self,
        provider: &dyn UserProvider,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<Entity>,
    ) -> Result<usize, SelectError> {
        if self.is_empty() {
            return Ok(0);
        }
        let request = UserRequest {
            all: self.all,
            logins: self.logins.clone(),
            query: self.query.clone(),
        };
        let (found_tx, found_rx) = mpsc::channel(SELECT_BUFFER);
        forward(
            provider.search(&request, found_tx),
            found_rx,
            |u| self.accepts(u),
            Entity::User,
            cancel,
            tx,
        )
        .await
    }

    pub fn filter(&self, message: &ActionMessage) -> ActionMessage {
        let Some(query) = &self.query else {
            return message.clone();
        };
        ActionMessage {
            users: message
                .users
                .iter()
                .filter(|u| query.matches(*u))
                .cloned()
                .collect(),
            ..message.clone()
        }
    }
}

/// Either selector kind behind one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Selector {
    Nodes(NodesSelector),
    Users(UsersSelector),
}

impl Selector {
    pub fn is_empty(&self) -> bool {
        match self {
            Selector::Nodes(s) => s.is_empty(),
            Selector::Users(s) => s.is_empty(),
        }
    }

    pub fn multiple_selection(&self) -> bool {
        match self {
            Selector::Nodes(s) => s.multiple_selection(),
            Selector::Users(s) => s.multiple_selection(),
        }
    }

    pub async fn select(
        &self,
        providers: &Providers,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<Entity>,
    ) -> Result<usize, SelectError> {
        match self {
            Selector::Nodes(s) => s.select(providers.nodes.as_ref(), cancel, tx).await,
            Selector::Users(s) => s.select(providers.users.as_ref(), cancel, tx).await,
        }
    }

    pub fn filter(&self, message: &ActionMessage) -> ActionMessage {
        match self {
            Selector::Nodes(s) => s.filter(message),
            Selector::Users(s) => s.filter(message),
        }
    }

    /// Number of entities of this selector's kind carried by `message`
    pub fn count_in(&self, message: &ActionMessage) -> usize {
        match self {
            Selector::Nodes(_) => message.nodes.len(),
            Selector::Users(_) => message.users.len(),
        }
    }
}

/// Pump provider results through `accept` into the shared entity channel
/// while the provider search runs.
async fn forward<T, S>(
    search: S,
    mut found: mpsc::Receiver<T>,
    accept: impl Fn(&T) -> bool,
    wrap: impl Fn(T) -> Entity,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<Entity>,
) -> Result<usize, SelectError>
where
    S: Future<Output = Result<(), ProviderError>>,
{
    let pump = async move {
        let mut sent = 0;
        while let Some(item) = found.recv().await {
            if !accept(&item) {
                continue;
            }
            if tx.send(wrap(item)).await.is_err() {
                break;
            }
            sent += 1;
        }
        // Unblock the provider if we stopped early
        drop(found);
        sent
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(SelectError::Cancelled),
        (searched, sent) = async { tokio::join!(search, pump) } => {
            searched?;
            Ok(sent)
        }
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
