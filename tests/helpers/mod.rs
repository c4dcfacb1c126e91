#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use taskscope::index::SearchIndex;
use taskscope::model::{Entity, Resource, Status};
use taskscope::store::{EntityStore, InMemoryStore, OperationEntry, ResourceStore};

/// Minimal open task.
pub fn task(id: &str, title: &str) -> Entity {
    Entity::new(id, title)
}

pub fn with_status(mut entity: Entity, status: Status) -> Entity {
    entity.status = status;
    entity
}

pub fn with_description(mut entity: Entity, description: &str) -> Entity {
    entity.description = Some(description.to_string());
    entity
}

pub fn child_of(id: &str, title: &str, parent: &str) -> Entity {
    let mut entity = Entity::new(id, title);
    entity.parent_id = Some(parent.to_string());
    entity
}

pub fn resource(id: &str, path: &str, title: &str, content: &str) -> Resource {
    Resource {
        id: id.to_string(),
        path: path.to_string(),
        title: title.to_string(),
        content: content.to_string(),
    }
}

/// Deterministic timestamp `minute` minutes into a fixed hour.
pub fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, minute, 0).unwrap()
}

pub fn op(ts: DateTime<Utc>, tool: &str, entity_id: &str, actor: &str) -> OperationEntry {
    OperationEntry {
        ts,
        tool: tool.to_string(),
        params: json!({ "id": entity_id }),
        result: None,
        resource_id: None,
        actor: actor.to_string(),
    }
}

pub fn op_with_params(
    ts: DateTime<Utc>,
    tool: &str,
    params: serde_json::Value,
    actor: &str,
) -> OperationEntry {
    OperationEntry {
        ts,
        tool: tool.to_string(),
        params,
        result: None,
        resource_id: None,
        actor: actor.to_string(),
    }
}

/// Index everything currently in the store.
pub fn indexed(store: &InMemoryStore) -> SearchIndex {
    let index = SearchIndex::new();
    index
        .index_entities(&store.list_all_entities().unwrap())
        .unwrap();
    index
        .index_resources(&store.list_resources().unwrap())
        .unwrap();
    index
}
