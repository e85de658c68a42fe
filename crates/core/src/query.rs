// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composable entity queries
//!
//! A `Query` combines sub-queries with AND or OR. Each sub-query is a set of
//! predicates that must all hold; predicates left unset are ignored, so an
//! empty sub-query (or a query with no sub-queries) matches everything.

use crate::message::{Node, NodeType, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything that can accept or reject a candidate
pub trait Predicate<T> {
    fn matches(&self, candidate: &T) -> bool;
}

/// How top-level sub-queries combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Or,
    And,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "Q: Serialize", deserialize = "Q: Deserialize<'de>"))]
pub struct Query<Q> {
    #[serde(default)]
    pub sub_queries: Vec<Q>,
    #[serde(default)]
    pub operation: Operation,
}

impl<Q> Default for Query<Q> {
    fn default() -> Self {
        Self {
            sub_queries: Vec::new(),
            operation: Operation::default(),
        }
    }
}

impl<Q> Query<Q> {
    pub fn all_of(sub_queries: Vec<Q>) -> Self {
        Self {
            sub_queries,
            operation: Operation::And,
        }
    }

    pub fn any_of(sub_queries: Vec<Q>) -> Self {
        Self {
            sub_queries,
            operation: Operation::Or,
        }
    }
}

impl<T, Q: Predicate<T>> Predicate<T> for Query<Q> {
    fn matches(&self, candidate: &T) -> bool {
        if self.sub_queries.is_empty() {
            return true;
        }
        match self.operation {
            Operation::And => self.sub_queries.iter().all(|q| q.matches(candidate)),
            Operation::Or => self.sub_queries.iter().any(|q| q.matches(candidate)),
        }
    }
}

/// Match `name` against a pattern where `*` stands for any run of
/// characters. Without a `*` the pattern must equal the name.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return pattern == name;
    };
    if !name.starts_with(first) {
        return false;
    }
    let mut rest = &name[first.len()..];
    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Predicates over tree nodes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeQuery {
    /// Node path must start with one of these
    pub paths_prefix: Vec<String>,
    pub node_type: Option<NodeType>,
    /// Comma-separated list of accepted extensions, without dots
    pub extension: Option<String>,
    pub extension_case_sensitive: bool,
    /// Glob matched against the base name
    pub file_name: Option<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
}

impl NodeQuery {
    fn extension_matches(&self, list: &str, node: &Node) -> bool {
        let name = node.base_name();
        let Some((_, ext)) = name.rsplit_once('.') else {
            return false;
        };
        list.split(',')
            .map(|e| e.trim().trim_start_matches('.'))
            .filter(|e| !e.is_empty())
            .any(|e| {
                if self.extension_case_sensitive {
                    e == ext
                } else {
                    e.eq_ignore_ascii_case(ext)
                }
            })
    }
}

impl Predicate<Node> for NodeQuery {
    fn matches(&self, node: &Node) -> bool {
        if !self.paths_prefix.is_empty()
            && !self.paths_prefix.iter().any(|p| node.path.starts_with(p.as_str()))
        {
            return false;
        }
        if self.node_type.is_some_and(|t| t != node.node_type) {
            return false;
        }
        if let Some(list) = &self.extension {
            if !self.extension_matches(list, node) {
                return false;
            }
        }
        if let Some(pattern) = &self.file_name {
            if !glob_match(pattern, node.base_name()) {
                return false;
            }
        }
        if self.min_size.is_some_and(|min| node.size < min)
            || self.max_size.is_some_and(|max| node.size > max)
        {
            return false;
        }
        if self.min_date.is_some_and(|min| node.mtime < min)
            || self.max_date.is_some_and(|max| node.mtime > max)
        {
            return false;
        }
        true
    }
}

/// Predicates over users and groups
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserQuery {
    pub uuids: Vec<String>,
    /// Glob matched against the login
    pub login: Option<String>,
    /// User's group path must start with this
    pub group_path: Option<String>,
    pub has_role: Option<String>,
    pub is_group: Option<bool>,
}

impl Predicate<User> for UserQuery {
    fn matches(&self, user: &User) -> bool {
        if !self.uuids.is_empty() && !self.uuids.contains(&user.uuid) {
            return false;
        }
        if let Some(pattern) = &self.login {
            if !glob_match(pattern, &user.login) {
                return false;
            }
        }
        if let Some(prefix) = &self.group_path {
            if !user.group_path.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(role) = &self.has_role {
            if !user.roles.contains(role) {
                return false;
            }
        }
        if self.is_group.is_some_and(|g| g != user.is_group) {
            return false;
        }
        true
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
