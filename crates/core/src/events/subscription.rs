// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic patterns and subscriptions

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one segment
    One,
    /// `**`: the rest of the name, including nothing
    Rest,
}

/// Pattern over `:`-separated topic names
///   - Exact: "task:status"
///   - Single wildcard: "node:*" matches "node:create", not "node:meta:update"
///   - Rest: "task:**" matches every task topic; "*" or "**" alone match all
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl EventPattern {
    pub fn new(pattern: &str) -> Self {
        let segments = match pattern {
            "" => Vec::new(),
            "*" | "**" => vec![Segment::Rest],
            _ => pattern
                .split(':')
                .map(|s| match s {
                    "*" => Segment::One,
                    "**" => Segment::Rest,
                    _ => Segment::Literal(s.to_string()),
                })
                .collect(),
        };
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn matches(&self, event_name: &str) -> bool {
        if self.segments.is_empty() {
            return false;
        }
        let mut names = event_name.split(':');
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::One => {
                    if names.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(lit) => {
                    if names.next() != Some(lit.as_str()) {
                        return false;
                    }
                }
            }
        }
        names.next().is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub String);

/// A named set of patterns
#[derive(Clone, Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub patterns: Vec<EventPattern>,
}

impl Subscription {
    pub fn new(id: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            id: SubscriberId(id.into()),
            patterns: patterns.iter().map(|p| EventPattern::new(p)).collect(),
        }
    }

    pub fn matches(&self, event_name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(event_name))
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
