// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out completion specs
//!
//! A per-entity selector runs its action once per match; the task only
//! completes after every branch is done.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn task_finishes_after_every_branch() {
    let nodes: Vec<Node> = (0..5).map(|i| file(&format!("inbox/{i}.txt"))).collect();
    let engine = Engine::with_nodes(nodes).await;
    let mut per_node = Action::new(HOLD).then(Action::new(STEP));
    per_node.nodes_selector = Some(every_node(false));
    engine
        .register(Job::new("fan", "").with_action(per_node))
        .await;

    engine.trigger("fan");
    engine.wait_held(5).await;

    // Four of five branches done: still running
    engine.release(4);
    wait_until(|| engine.seen().len() == 4).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(engine.live_status("task-1"), Some(TaskStatus::Running));

    engine.release(1);
    let done = engine.stored("task-1", TaskStatus::Finished).await;
    assert_eq!(done.actions_logs.len(), 10);

    let mut paths: Vec<String> = engine
        .seen()
        .iter()
        .map(|m| {
            assert_eq!(m.nodes.len(), 1);
            m.nodes[0].path.clone()
        })
        .collect();
    paths.sort();
    assert_eq!(
        paths,
        (0..5).map(|i| format!("inbox/{i}.txt")).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn collecting_selector_runs_once_with_every_match() {
    let engine = Engine::with_nodes(vec![file("a.txt"), file("b.txt")]).await;
    let mut all = Action::new(STEP);
    all.nodes_selector = Some(every_node(true));
    engine
        .register(Job::new("batch", "").with_action(all))
        .await;

    engine.trigger("batch");
    engine.stored("task-1", TaskStatus::Finished).await;
    let seen = engine.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].nodes.len(), 2);
}

#[tokio::test]
async fn provider_outage_fails_the_task() {
    let engine = Engine::start().await;
    engine.nodes.fail_with("tree offline");
    let mut action = Action::new(STEP);
    action.nodes_selector = Some(every_node(false));
    engine
        .register(Job::new("offline", "").with_action(action))
        .await;

    engine.trigger("offline");
    let failed = engine.stored("task-1", TaskStatus::Error).await;
    assert!(failed.status_message.contains("tree offline"), "{}", failed.status_message);
    assert!(engine.seen().is_empty());
}
