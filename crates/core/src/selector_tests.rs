// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::query::Operation;
use async_trait::async_trait;
use chrono::Utc;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Serves a fixed list of nodes and counts searches
#[derive(Default)]
struct ListNodes {
    nodes: Vec<Node>,
    searches: Arc<AtomicUsize>,
}

#[async_trait]
impl NodeProvider for ListNodes {
    async fn search(
        &self,
        request: &NodeRequest,
        tx: mpsc::Sender<Node>,
    ) -> Result<(), ProviderError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        for node in &self.nodes {
            if !request.all && !request.paths.is_empty() && !request.paths.contains(&node.path) {
                continue;
            }
            if tx.send(node.clone()).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

struct ListUsers(Vec<User>);

#[async_trait]
impl UserProvider for ListUsers {
    async fn search(
        &self,
        _request: &UserRequest,
        tx: mpsc::Sender<User>,
    ) -> Result<(), ProviderError> {
        for user in &self.0 {
            if tx.send(user.clone()).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl NodeProvider for Failing {
    async fn search(&self, _: &NodeRequest, _: mpsc::Sender<Node>) -> Result<(), ProviderError> {
        Err(ProviderError::Unavailable("index offline".into()))
    }
}

fn node(path: &str) -> Node {
    Node::file(path, 1, Utc::now())
}

fn pdf_query() -> Query<NodeQuery> {
    Query::any_of(vec![NodeQuery {
        file_name: Some("*.pdf".into()),
        ..Default::default()
    }])
}

fn drain(rx: &mut mpsc::Receiver<Entity>) -> Vec<Entity> {
    let mut out = Vec::new();
    while let Ok(e) = rx.try_recv() {
        out.push(e);
    }
    out
}

#[tokio::test]
async fn empty_selector_does_not_query_provider() {
    let provider = ListNodes {
        nodes: vec![node("a.pdf")],
        ..Default::default()
    };
    let searches = Arc::clone(&provider.searches);
    let (tx, _rx) = mpsc::channel(8);

    let sent = NodesSelector::default()
        .select(&provider, &CancellationToken::new(), &tx)
        .await
        .unwrap();

    assert_eq!(sent, 0);
    assert_eq!(searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn select_all_reapplies_query_to_provider_results() {
    let provider = ListNodes {
        nodes: vec![node("a.pdf"), node("b.txt"), node("c.pdf")],
        ..Default::default()
    };
    let selector = NodesSelector {
        all: true,
        query: Some(pdf_query()),
        ..Default::default()
    };
    let (tx, mut rx) = mpsc::channel(8);

    let sent = selector
        .select(&provider, &CancellationToken::new(), &tx)
        .await
        .unwrap();

    assert_eq!(sent, 2);
    let paths: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            Entity::Node(n) => Some(n.path),
            Entity::User(_) => None,
        })
        .collect();
    assert_eq!(paths, vec!["a.pdf", "c.pdf"]);
}

#[tokio::test]
async fn select_by_paths() {
    let provider = ListNodes {
        nodes: vec![node("a.pdf"), node("b.txt")],
        ..Default::default()
    };
    let selector = NodesSelector {
        paths: vec!["b.txt".into()],
        ..Default::default()
    };
    let (tx, mut rx) = mpsc::channel(8);
    let sent = selector
        .select(&provider, &CancellationToken::new(), &tx)
        .await
        .unwrap();
    assert_eq!(sent, 1);
    assert!(matches!(&drain(&mut rx)[0], Entity::Node(n) if n.path == "b.txt"));
}

#[tokio::test]
async fn provider_errors_surface() {
    let selector = NodesSelector {
        all: true,
        ..Default::default()
    };
    let (tx, _rx) = mpsc::channel(8);
    let err = selector
        .select(&Failing, &CancellationToken::new(), &tx)
        .await
        .unwrap_err();
    assert!(matches!(err, SelectError::Provider(ProviderError::Unavailable(_))));
}

#[tokio::test]
async fn cancelled_selection_returns_cancelled() {
    let provider = ListNodes {
        nodes: (0..10).map(|i| node(&format!("{i}.pdf"))).collect(),
        ..Default::default()
    };
    let selector = NodesSelector {
        all: true,
        ..Default::default()
    };
    // Tiny downstream buffer that nobody drains keeps the pump blocked
    let (tx, _rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = selector.select(&provider, &cancel, &tx).await.unwrap_err();
    assert!(matches!(err, SelectError::Cancelled));
}

#[tokio::test]
async fn selector_enum_dispatches_to_user_provider() {
    let providers = Providers::new(
        ListNodes::default(),
        ListUsers(vec![User::new("alice", "/staff"), User::new("bob", "/guests")]),
    );
    let selector = Selector::Users(UsersSelector {
        query: Some(Query::any_of(vec![UserQuery {
            group_path: Some("/staff".into()),
            ..Default::default()
        }])),
        collect: true,
        ..Default::default()
    });
    let (tx, mut rx) = mpsc::channel(8);

    assert!(selector.multiple_selection());
    let sent = selector
        .select(&providers, &CancellationToken::new(), &tx)
        .await
        .unwrap();
    assert_eq!(sent, 1);
    assert!(matches!(&drain(&mut rx)[0], Entity::User(u) if u.login == "alice"));
}

#[test]
fn filter_without_query_passes_everything() {
    let message = ActionMessage {
        nodes: vec![node("a.txt"), node("b.pdf")],
        ..Default::default()
    };
    let selector = NodesSelector {
        all: true,
        ..Default::default()
    };
    assert_eq!(selector.filter(&message), message);
}

#[test]
fn filter_returns_new_message_and_leaves_input_alone() {
    let message = ActionMessage {
        nodes: vec![node("a.txt"), node("b.pdf")],
        users: vec![User::new("alice", "/")],
        ..Default::default()
    };
    let before = message.clone();
    let selector = Selector::Nodes(NodesSelector {
        query: Some(pdf_query()),
        ..Default::default()
    });

    let filtered = selector.filter(&message);
    assert_eq!(filtered.nodes.len(), 1);
    assert_eq!(filtered.nodes[0].path, "b.pdf");
    assert_eq!(filtered.users, message.users);
    assert_eq!(message, before);
}

#[test]
fn filter_matching_nothing_leaves_input_intact() {
    let message = ActionMessage {
        nodes: vec![node("a.txt")],
        ..Default::default()
    };
    let selector = Selector::Nodes(NodesSelector {
        query: Some(pdf_query()),
        ..Default::default()
    });

    let filtered = selector.filter(&message);
    assert_eq!(selector.count_in(&filtered), 0);
    assert_eq!(message.nodes.len(), 1);
}

fn arb_node() -> impl Strategy<Value = Node> {
    ("[a-c]{1,3}", prop::sample::select(vec!["pdf", "txt", "PDF"]), 0u64..100).prop_map(
        |(stem, ext, size)| Node::file(format!("dir/{stem}.{ext}"), size, Utc::now()),
    )
}

fn arb_query() -> impl Strategy<Value = Query<NodeQuery>> {
    let sub = (
        proptest::option::of(prop::sample::select(vec!["pdf", "txt,pdf", "doc"])),
        proptest::option::of(prop::sample::select(vec!["a*", "*b*", "*.txt"])),
        proptest::option::of(0u64..100),
    )
        .prop_map(|(ext, name, max)| NodeQuery {
            extension: ext.map(String::from),
            file_name: name.map(String::from),
            max_size: max,
            ..Default::default()
        });
    (proptest::collection::vec(sub, 0..3), any::<bool>()).prop_map(|(subs, and)| Query {
        sub_queries: subs,
        operation: if and { Operation::And } else { Operation::Or },
    })
}

proptest! {
    #[test]
    fn filter_is_pure_and_idempotent(
        nodes in proptest::collection::vec(arb_node(), 0..8),
        query in arb_query(),
    ) {
        let message = ActionMessage { nodes, ..Default::default() };
        let before = message.clone();
        let selector = Selector::Nodes(NodesSelector { query: Some(query), ..Default::default() });

        let once = selector.filter(&message);
        let again = selector.filter(&message);
        prop_assert_eq!(&message, &before);
        prop_assert_eq!(&once, &again);
        prop_assert_eq!(selector.filter(&once), once.clone());
        prop_assert!(once.nodes.len() <= message.nodes.len());
    }
}
