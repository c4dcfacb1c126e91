mod helpers;

use std::sync::Arc;

use helpers::{child_of, op, task, ts};
use taskscope::config::ContextConfig;
use taskscope::context::{ContextPipeline, ContextRequest};
use taskscope::store::InMemoryStore;

fn pipeline_with(store: &Arc<InMemoryStore>, config: ContextConfig) -> ContextPipeline {
    ContextPipeline::new(store.clone(), store.clone(), store.clone(), config)
}

#[test]
fn activity_covers_focal_parent_and_children_only() {
    let store = Arc::new(InMemoryStore::new());
    store.put_entity(task("EPIC-0001", "Epic"));
    store.put_entity(child_of("TASK-0001", "Focal", "EPIC-0001"));
    store.put_entity(child_of("TASK-0002", "Child", "TASK-0001"));
    store.put_entity(task("TASK-0099", "Elsewhere"));

    store.record_operation(op(ts(1), "task_update", "EPIC-0001", "agent-a"));
    store.record_operation(op(ts(2), "task_update", "TASK-0001", "agent-a"));
    store.record_operation(op(ts(3), "task_update", "TASK-0002", "agent-a"));
    store.record_operation(op(ts(4), "task_update", "TASK-0099", "agent-a"));

    let response = pipeline_with(&store, ContextConfig::default())
        .assemble(&ContextRequest::new("TASK-0001"))
        .unwrap()
        .unwrap();

    let ids: Vec<&str> = response
        .activity
        .iter()
        .filter_map(|a| a.entity_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["TASK-0002", "TASK-0001", "EPIC-0001"]);
}

#[test]
fn activity_limit_comes_from_configuration() {
    let store = Arc::new(InMemoryStore::new());
    store.put_entity(task("TASK-0001", "Focal"));
    for minute in 0..10 {
        store.record_operation(op(ts(minute), "task_update", "TASK-0001", "agent-a"));
    }

    let config = ContextConfig {
        activity_limit: 3,
        ..Default::default()
    };
    let response = pipeline_with(&store, config)
        .assemble(&ContextRequest::new("TASK-0001"))
        .unwrap()
        .unwrap();
    assert_eq!(response.activity.len(), 3);
    assert_eq!(response.activity[0].ts, ts(9));
}

#[test]
fn session_gap_comes_from_configuration() {
    let store = Arc::new(InMemoryStore::new());
    store.put_entity(task("TASK-0001", "Focal"));
    store.record_operation(op(ts(0), "task_update", "TASK-0001", "agent-a"));
    store.record_operation(op(ts(10), "task_update", "TASK-0001", "agent-a"));

    // Default 30-minute gap keeps both operations in one run.
    let wide = pipeline_with(&store, ContextConfig::default())
        .assemble(&ContextRequest::new("TASK-0001"))
        .unwrap()
        .unwrap();
    assert_eq!(wide.session_summary.as_ref().unwrap().operation_count, 2);

    // A 5-minute gap splits them.
    let config = ContextConfig {
        session_gap_minutes: 5,
        ..Default::default()
    };
    let narrow = pipeline_with(&store, config)
        .assemble(&ContextRequest::new("TASK-0001"))
        .unwrap()
        .unwrap();
    assert_eq!(narrow.session_summary.as_ref().unwrap().operation_count, 1);
}
