// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maintenance specs
//!
//! Housekeeping runs as ordinary system jobs through the same engine.

use crate::prelude::*;
use similar_asserts::assert_eq;
use chrono::Utc;

async fn maintenance_engine() -> Engine {
    let config = MaintenanceConfig {
        stale_threshold: Duration::from_secs(60),
        prune_keep: 2,
        ..MaintenanceConfig::default()
    };
    let engine = Engine::with_maintenance(config.clone()).await;
    for job in system_jobs(&config) {
        engine.register(job).await;
    }
    engine
}

fn json(record: &TaskRecord) -> serde_json::Value {
    record.actions_logs[0]
        .output
        .last_output()
        .unwrap()
        .json_body
        .clone()
        .unwrap()
}

#[tokio::test]
async fn system_jobs_are_scheduled() {
    let engine = maintenance_engine().await;
    wait_until(|| engine.runtime.producer().scheduled_jobs().len() == 3).await;
}

#[tokio::test]
async fn fix_stuck_interrupts_old_running_tasks() {
    let engine = maintenance_engine().await;
    engine.store.put_job(Job::new("worker", "")).await.unwrap();
    let mut stuck = TaskRecord::new("ancient".into(), "worker".into(), "tester");
    stuck.status = TaskStatus::Running;
    stuck.start_time = Some(Utc::now() - chrono::Duration::hours(2));
    engine.store.put_task(stuck).await.unwrap();
    let mut fresh = TaskRecord::new("fresh".into(), "worker".into(), "tester");
    fresh.status = TaskStatus::Running;
    fresh.start_time = Some(Utc::now());
    engine.store.put_task(fresh).await.unwrap();

    engine.trigger("internal-fix-stuck");
    let run = engine.stored("task-1", TaskStatus::Finished).await;
    assert_eq!(json(&run), serde_json::json!({"fixed": 1}));

    let ancient = engine.stored("ancient", TaskStatus::Interrupted).await;
    assert!(ancient.status_message.starts_with("interrupted"));
    let fresh = engine.store.get_task(&"fresh".into()).await.unwrap().unwrap();
    assert_eq!(fresh.status, TaskStatus::Running);
}

#[tokio::test]
async fn fix_stuck_frees_the_slot_of_a_task_ignoring_its_controls() {
    let config = MaintenanceConfig {
        stale_threshold: Duration::from_millis(20),
        ..MaintenanceConfig::default()
    };
    let engine = Engine::with_maintenance(config.clone()).await;
    for job in system_jobs(&config) {
        engine.register(job).await;
    }
    engine
        .register(
            Job::new("wedged", "")
                .with_action(Action::new(WEDGE))
                .with_max_concurrency(1),
        )
        .await;

    engine.trigger("wedged");
    engine.stored("task-1", TaskStatus::Running).await;
    engine.wait_held(1).await;
    engine.trigger("wedged");
    engine.stored("task-2", TaskStatus::Queued).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.trigger("internal-fix-stuck");
    let run = engine.stored("task-3", TaskStatus::Finished).await;
    assert_eq!(json(&run), serde_json::json!({"fixed": 1}));
    engine.stored("task-1", TaskStatus::Interrupted).await;

    // The deferred task takes over the freed slot
    engine.wait_live("task-2", TaskStatus::Running).await;
    engine.wait_held(2).await;
    assert_eq!(engine.live_status("task-1"), None);
}

#[tokio::test]
async fn prune_keeps_most_recent_terminal_tasks() {
    let engine = maintenance_engine().await;
    engine.store.put_job(Job::new("chatty", "")).await.unwrap();
    for i in 0..5 {
        let mut task = TaskRecord::new(format!("old-{i}").into(), "chatty".into(), "tester");
        task.status = TaskStatus::Finished;
        task.start_time = Some(Utc::now() - chrono::Duration::minutes(10 - i));
        task.end_time = task.start_time;
        engine.store.put_task(task).await.unwrap();
    }

    engine.trigger("internal-prune-tasks");
    let run = engine.stored("task-1", TaskStatus::Finished).await;
    assert_eq!(json(&run), serde_json::json!({"deleted": 3}));

    let left: Vec<String> = engine
        .store
        .list_tasks(&"chatty".into(), &[])
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id.to_string())
        .collect();
    assert_eq!(left, vec!["old-3".to_string(), "old-4".to_string()]);
}

#[tokio::test]
async fn clean_removes_finished_auto_clean_jobs() {
    let engine = maintenance_engine().await;
    let mut once = Job::new("one-shot", "").with_action(Action::new(STEP));
    once.auto_clean = true;
    engine.register(once).await;
    engine
        .register(Job::new("keeper", "").with_action(Action::new(STEP)))
        .await;

    engine.trigger("one-shot");
    engine.stored("task-1", TaskStatus::Finished).await;

    engine.trigger("internal-clean-jobs");
    let run = engine.stored("task-2", TaskStatus::Finished).await;
    assert_eq!(json(&run), serde_json::json!({"deleted": ["one-shot"]}));
    assert!(engine.store.get_job(&"one-shot".into()).await.unwrap().is_none());
    assert!(engine.store.get_job(&"keeper".into()).await.unwrap().is_some());
}
