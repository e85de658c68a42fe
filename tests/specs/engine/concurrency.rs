// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency gating specs
//!
//! A job's MaxConcurrency bounds how many of its tasks run at once;
//! triggers beyond the bound wait in FIFO order.

use crate::prelude::*;
use similar_asserts::assert_eq;

fn single(id: &str) -> Job {
    Job::new(id, "")
        .with_action(Action::new(HOLD))
        .with_max_concurrency(1)
}

#[tokio::test]
async fn second_trigger_stays_queued_until_first_ends() {
    let engine = Engine::start().await;
    engine.register(single("one-at-a-time")).await;

    engine.trigger("one-at-a-time");
    engine.trigger("one-at-a-time");
    engine.wait_held(1).await;
    engine.stored("task-2", TaskStatus::Queued).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.live_status("task-2"), Some(TaskStatus::Queued));
    assert_eq!(engine.held(), 1);

    engine.release(1);
    let first = engine.stored("task-1", TaskStatus::Finished).await;
    engine.wait_held(2).await;
    engine.release(1);
    let second = engine.stored("task-2", TaskStatus::Finished).await;

    assert!(second.start_time.unwrap() >= first.end_time.unwrap());
}

#[tokio::test]
async fn deferred_tasks_start_in_trigger_order() {
    let engine = Engine::start().await;
    engine.register(single("fifo")).await;

    for _ in 0..3 {
        engine.trigger("fifo");
    }
    engine.wait_held(1).await;
    engine.wait_live("task-3", TaskStatus::Queued).await;

    engine.release(1);
    engine.stored("task-1", TaskStatus::Finished).await;
    engine.wait_live("task-2", TaskStatus::Running).await;
    assert_eq!(engine.live_status("task-3"), Some(TaskStatus::Queued));

    engine.release(2);
    engine.stored("task-2", TaskStatus::Finished).await;
    engine.stored("task-3", TaskStatus::Finished).await;
}

#[tokio::test]
async fn unlimited_job_runs_triggers_side_by_side() {
    let engine = Engine::start().await;
    engine
        .register(Job::new("wide", "").with_action(Action::new(HOLD)))
        .await;

    for _ in 0..3 {
        engine.trigger("wide");
    }
    engine.wait_held(3).await;
    engine.release(3);
    for id in ["task-1", "task-2", "task-3"] {
        engine.stored(id, TaskStatus::Finished).await;
    }
}
