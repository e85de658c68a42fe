// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity provider contracts
//!
//! Providers stream candidates into a channel and return once exhausted.
//! They may over-approximate: selectors re-apply their query to every
//! candidate they receive.

use crate::message::{Node, User};
use crate::query::{NodeQuery, Query, UserQuery};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("lookup failed: {0}")]
    Lookup(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What to fetch from a node provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRequest {
    pub all: bool,
    pub paths: Vec<String>,
    pub query: Option<Query<NodeQuery>>,
}

/// What to fetch from a user provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRequest {
    pub all: bool,
    pub logins: Vec<String>,
    pub query: Option<Query<UserQuery>>,
}

/// Streaming lookup of tree nodes
#[async_trait]
pub trait NodeProvider: Send + Sync + 'static {
    /// Send matching nodes to `tx`. A closed receiver ends the search early
    /// and is not an error.
    async fn search(&self, request: &NodeRequest, tx: mpsc::Sender<Node>)
        -> Result<(), ProviderError>;
}

/// Streaming lookup of users and groups
#[async_trait]
pub trait UserProvider: Send + Sync + 'static {
    async fn search(&self, request: &UserRequest, tx: mpsc::Sender<User>)
        -> Result<(), ProviderError>;
}

/// The providers available to selectors
#[derive(Clone)]
pub struct Providers {
    pub nodes: Arc<dyn NodeProvider>,
    pub users: Arc<dyn UserProvider>,
}

impl Providers {
    pub fn new(nodes: impl NodeProvider, users: impl UserProvider) -> Self {
        Self {
            nodes: Arc::new(nodes),
            users: Arc::new(users),
        }
    }
}
