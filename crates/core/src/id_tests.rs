// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn uuid_task_ids_are_unique() {
    let id_gen = UuidIdGen;
    let a = id_gen.next_task_id();
    let b = id_gen.next_task_id();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 36);
}

#[test]
fn sequential_ids_are_shared_between_clones() {
    let id_gen1 = SequentialIdGen::new("t");
    let id_gen2 = id_gen1.clone();
    assert_eq!(id_gen1.next_task_id(), TaskId::new("t-1"));
    assert_eq!(id_gen2.next_task_id(), TaskId::new("t-2"));
    assert_eq!(id_gen1.next(), "t-3");
}

#[test]
fn ids_serialize_as_bare_strings() {
    let id = JobId::from("nightly-report");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"nightly-report\"");
    let back: JobId = serde_json::from_str("\"nightly-report\"").unwrap();
    assert_eq!(back, id);
    assert_eq!(id.to_string(), "nightly-report");
}
