// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-driven job specs
//!
//! Node and user changes on the bus start tasks for the jobs listening
//! to them.

use crate::prelude::*;
use similar_asserts::assert_eq;

fn created(path: &str) -> Event {
    Event::NodeChange(NodeChange {
        kind: ChangeKind::Create,
        source: None,
        target: Some(file(path)),
    })
}

#[tokio::test]
async fn created_node_starts_listening_job() {
    let engine = Engine::start().await;
    engine
        .register(
            Job::new("thumbnails", "")
                .with_events(&["node:create"])
                .with_action(Action::new(STEP)),
        )
        .await;

    engine.publish(created("photos/cat.jpg"));
    engine.stored("task-1", TaskStatus::Finished).await;

    let seen = engine.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].nodes.len(), 1);
    assert_eq!(seen[0].nodes[0].path, "photos/cat.jpg");
}

#[tokio::test]
async fn filter_skips_nodes_that_do_not_match() {
    let engine = Engine::start().await;
    let mut only_jpg = Action::new(STEP);
    only_jpg.nodes_filter = Some(NodesSelector {
        query: Some(jobs_core::Query::all_of(vec![jobs_core::NodeQuery {
            extension: Some("jpg".into()),
            ..Default::default()
        }])),
        ..NodesSelector::default()
    });
    engine
        .register(
            Job::new("jpg-only", "")
                .with_events(&["node:*"])
                .with_action(only_jpg),
        )
        .await;

    engine.publish(created("notes.txt"));
    let skipped = engine.stored("task-1", TaskStatus::Finished).await;
    assert!(skipped.actions_logs[0].output.last_output().unwrap().ignored);

    engine.publish(created("cat.jpg"));
    engine.stored("task-2", TaskStatus::Finished).await;
    assert_eq!(engine.seen().len(), 1);
}

#[tokio::test]
async fn inactive_job_ignores_events() {
    let engine = Engine::start().await;
    let mut job = Job::new("sleeping", "")
        .with_events(&["node:create"])
        .with_action(Action::new(STEP));
    job.inactive = true;
    engine.register(job).await;

    engine.publish(created("a.txt"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.live_status("task-1").is_none());
    assert!(engine.store.get_task(&"task-1".into()).await.unwrap().is_none());
}
