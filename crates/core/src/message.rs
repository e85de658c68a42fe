// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline payload passed between chained actions
//!
//! `ActionMessage` is a plain value: every stage receives its own copy, so a
//! filter or failure in one branch never changes what a sibling sees.

use crate::id::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    File,
    Collection,
}

/// A file or folder in the data tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub uuid: String,
    pub path: String,
    #[serde(default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub size: u64,
    pub mtime: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Node {
    pub fn file(path: impl Into<String>, size: u64, mtime: DateTime<Utc>) -> Self {
        let path = path.into();
        Self {
            uuid: path.clone(),
            path,
            node_type: NodeType::File,
            size,
            mtime,
            metadata: BTreeMap::new(),
        }
    }

    pub fn collection(path: impl Into<String>, mtime: DateTime<Utc>) -> Self {
        Self {
            node_type: NodeType::Collection,
            ..Self::file(path, 0, mtime)
        }
    }

    /// Last path segment
    pub fn base_name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.path)
    }
}

/// A user or group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uuid: String,
    pub login: String,
    #[serde(default)]
    pub group_path: String,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl User {
    pub fn new(login: impl Into<String>, group_path: impl Into<String>) -> Self {
        let login = login.into();
        Self {
            uuid: login.clone(),
            login,
            group_path: group_path.into(),
            is_group: false,
            roles: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }
}

/// Either kind of selectable entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Node(Node),
    User(User),
}

/// What happened to an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Read,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Read => "read",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// A change to a node in the tree; moves carry both sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeChange {
    pub kind: ChangeKind,
    #[serde(default)]
    pub source: Option<Node>,
    #[serde(default)]
    pub target: Option<Node>,
}

impl NodeChange {
    /// The node the change is about: the deleted source, or the new target
    pub fn affected(&self) -> Option<&Node> {
        match self.kind {
            ChangeKind::Delete => self.source.as_ref().or(self.target.as_ref()),
            _ => self.target.as_ref().or(self.source.as_ref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserChange {
    pub kind: ChangeKind,
    pub user: User,
}

/// Payload of whatever started a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerEvent {
    Schedule {
        job_id: JobId,
        fired_at: DateTime<Utc>,
    },
    NodeChange(NodeChange),
    UserChange(UserChange),
    Manual {
        job_id: JobId,
    },
}

/// Result of one action invocation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionOutput {
    pub success: bool,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutput {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A deliberate no-op; not a failure
    pub fn ignored() -> Self {
        Self {
            success: true,
            ignored: true,
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_string(mut self, body: impl Into<String>) -> Self {
        self.string_body = Some(body.into());
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.json_body = Some(body);
        self
    }
}

/// The payload threaded through a chain of actions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<TriggerEvent>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub output_chain: Vec<ActionOutput>,
}

impl ActionMessage {
    /// Initial message for a trigger: a node or user change seeds the
    /// affected entity; every other trigger starts empty.
    pub fn from_trigger(trigger: &TriggerEvent) -> Self {
        let mut message = Self {
            event: Some(trigger.clone()),
            ..Self::default()
        };
        match trigger {
            TriggerEvent::NodeChange(change) => {
                message.nodes.extend(change.affected().cloned());
            }
            TriggerEvent::UserChange(change) => message.users.push(change.user.clone()),
            TriggerEvent::Schedule { .. } | TriggerEvent::Manual { .. } => {}
        }
        message
    }

    pub fn with_output(mut self, output: ActionOutput) -> Self {
        self.output_chain.push(output);
        self
    }

    pub fn last_output(&self) -> Option<&ActionOutput> {
        self.output_chain.last()
    }

    /// Copy of this message with the selected entity (or set) replacing
    /// the current entities of the same kind.
    pub fn with_entities(&self, entities: &[Entity]) -> Self {
        let mut message = self.clone();
        let nodes: Vec<Node> = entities
            .iter()
            .filter_map(|e| match e {
                Entity::Node(n) => Some(n.clone()),
                Entity::User(_) => None,
            })
            .collect();
        let users: Vec<User> = entities
            .iter()
            .filter_map(|e| match e {
                Entity::User(u) => Some(u.clone()),
                Entity::Node(_) => None,
            })
            .collect();
        if !nodes.is_empty() {
            message.nodes = nodes;
        }
        if !users.is_empty() {
            message.users = users;
        }
        message
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
