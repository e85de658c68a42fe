// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control command specs
//!
//! Pause, resume and stop travel over the bus as `task:control` events.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn pause_and_resume_are_visible_in_the_store() {
    let engine = Engine::start().await;
    engine
        .register(Job::new("pausable", "").with_action(Action::new(HOLD).then(Action::new(STEP))))
        .await;
    engine.trigger("pausable");
    engine.wait_held(1).await;

    engine.control("task-1", ControlVerb::Pause);
    let paused = engine.stored("task-1", TaskStatus::Paused).await;
    assert!(paused.can_pause);

    engine.control("task-1", ControlVerb::Resume);
    engine.stored("task-1", TaskStatus::Running).await;

    engine.release(1);
    let done = engine.stored("task-1", TaskStatus::Finished).await;
    assert_eq!(done.actions_logs.len(), 2);
    assert_eq!(done.progress, 1.0);
}

#[tokio::test]
async fn stop_interrupts_without_running_chained_actions() {
    let engine = Engine::start().await;
    engine
        .register(Job::new("stoppable", "").with_action(Action::new(HOLD).then(Action::new(STEP))))
        .await;
    engine.trigger("stoppable");
    engine.wait_held(1).await;

    engine.control("task-1", ControlVerb::Stop);
    let stopped = engine.stored("task-1", TaskStatus::Interrupted).await;

    assert!(stopped.end_time.is_some());
    assert!(!stopped.can_stop);
    assert!(engine.seen().is_empty());
}

#[tokio::test]
async fn stop_while_paused_ends_the_task() {
    let engine = Engine::start().await;
    engine
        .register(Job::new("parked", "").with_action(Action::new(HOLD)))
        .await;
    engine.trigger("parked");
    engine.wait_held(1).await;

    engine.control("task-1", ControlVerb::Pause);
    engine.stored("task-1", TaskStatus::Paused).await;
    engine.control("task-1", ControlVerb::Stop);
    engine.stored("task-1", TaskStatus::Interrupted).await;
}

#[tokio::test]
async fn job_target_reaches_every_live_task() {
    let engine = Engine::start().await;
    engine
        .register(Job::new("crowd", "").with_action(Action::new(HOLD)))
        .await;
    engine.trigger("crowd");
    engine.trigger("crowd");
    engine.wait_held(2).await;

    engine.publish(Event::Control(ControlCommand::job("crowd", ControlVerb::Stop)));
    engine.stored("task-1", TaskStatus::Interrupted).await;
    engine.stored("task-2", TaskStatus::Interrupted).await;
}
