//! Collaborator interfaces for the external storage layer.
//!
//! The core consumes three read-only seams: [`EntityStore`] (work items),
//! [`ResourceStore`] (non-entity documents), and [`OperationLog`] (the
//! append-only history). Concrete on-disk implementations live outside this
//! crate; [`InMemoryStore`] implements all three for tests and embedders.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Entity, Resource};

/// A single append-only operation log entry, most-recent-first when read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationEntry {
    /// When the operation occurred.
    pub ts: DateTime<Utc>,
    /// Tool name that performed it (e.g. `create_task`, `update_task`).
    pub tool: String,
    /// Tool parameters as recorded.
    pub params: serde_json::Value,
    /// Tool result, if recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Entity or resource the operation touched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Who performed the operation (user or agent name).
    pub actor: String,
}

impl OperationEntry {
    /// The entity id this entry is about: the explicit `resource_id` when
    /// present, otherwise the `id` field of the recorded params.
    pub fn entity_id(&self) -> Option<&str> {
        self.resource_id
            .as_deref()
            .or_else(|| self.params.get("id").and_then(|v| v.as_str()))
    }
}

/// Listing options for [`EntityStore::list_entities`].
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Restrict to children of this resolved parent.
    pub parent_id: Option<String>,
    /// Maximum number of entities to return.
    pub limit: Option<usize>,
}

/// Read options for [`OperationLog::read_operations`].
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Restrict to entries touching this entity.
    pub entity_id: Option<String>,
    /// Maximum number of entries to return.
    pub limit: Option<usize>,
}

/// Structured error for store lookups that cannot be answered.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view over the entity corpus.
pub trait EntityStore: Send + Sync {
    /// Look up a single entity. `Ok(None)` when the id does not resolve.
    fn get_entity(&self, id: &str) -> Result<Option<Entity>>;

    /// List entities matching the query.
    fn list_entities(&self, query: &ListQuery) -> Result<Vec<Entity>>;

    /// List every entity. Used to build the per-request reverse-reference
    /// index.
    fn list_all_entities(&self) -> Result<Vec<Entity>>;
}

/// Read-only view over non-entity documents.
pub trait ResourceStore: Send + Sync {
    fn list_resources(&self) -> Result<Vec<Resource>>;
}

/// Read-only view over the append-only operation log.
pub trait OperationLog: Send + Sync {
    /// Read entries, most-recent-first.
    fn read_operations(&self, query: &LogQuery) -> Result<Vec<OperationEntry>>;
}

// ── In-memory implementation ──────────────────────────────────────────────────

/// In-process implementation of all three collaborator traits.
///
/// Holds entities keyed by id, resources, and a chronological operation log.
/// Interior locking keeps it usable behind shared references alongside the
/// search index.
#[derive(Default)]
pub struct InMemoryStore {
    entities: RwLock<HashMap<String, Entity>>,
    resources: RwLock<Vec<Resource>>,
    operations: RwLock<Vec<OperationEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity.
    pub fn put_entity(&self, entity: Entity) {
        self.entities
            .write()
            .expect("entity lock poisoned")
            .insert(entity.id.clone(), entity);
    }

    /// Insert a resource.
    pub fn put_resource(&self, resource: Resource) {
        self.resources
            .write()
            .expect("resource lock poisoned")
            .push(resource);
    }

    /// Append an operation log entry.
    pub fn record_operation(&self, entry: OperationEntry) {
        self.operations
            .write()
            .expect("operation lock poisoned")
            .push(entry);
    }

    /// Number of entities currently held.
    pub fn entity_count(&self) -> usize {
        self.entities.read().expect("entity lock poisoned").len()
    }
}

impl EntityStore for InMemoryStore {
    fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let entities = self
            .entities
            .read()
            .map_err(|e| StoreError::Unavailable(format!("entity lock poisoned: {e}")))?;
        Ok(entities.get(id).cloned())
    }

    fn list_entities(&self, query: &ListQuery) -> Result<Vec<Entity>> {
        let entities = self
            .entities
            .read()
            .map_err(|e| StoreError::Unavailable(format!("entity lock poisoned: {e}")))?;
        let mut matched: Vec<Entity> = entities
            .values()
            .filter(|e| match &query.parent_id {
                Some(parent) => e.effective_parent() == Some(parent.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        // Stable output across calls
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    fn list_all_entities(&self) -> Result<Vec<Entity>> {
        self.list_entities(&ListQuery::default())
    }
}

impl ResourceStore for InMemoryStore {
    fn list_resources(&self) -> Result<Vec<Resource>> {
        let resources = self
            .resources
            .read()
            .map_err(|e| StoreError::Unavailable(format!("resource lock poisoned: {e}")))?;
        Ok(resources.clone())
    }
}

impl OperationLog for InMemoryStore {
    fn read_operations(&self, query: &LogQuery) -> Result<Vec<OperationEntry>> {
        let operations = self
            .operations
            .read()
            .map_err(|e| StoreError::Unavailable(format!("operation lock poisoned: {e}")))?;
        let mut matched: Vec<OperationEntry> = operations
            .iter()
            .filter(|op| match &query.entity_id {
                Some(id) => op.entity_id() == Some(id.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        // Most-recent-first, per the log contract
        matched.sort_by(|a, b| b.ts.cmp(&a.ts));
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn op(ts_secs: i64, tool: &str, entity: &str, actor: &str) -> OperationEntry {
        OperationEntry {
            ts: Utc.timestamp_opt(ts_secs, 0).unwrap(),
            tool: tool.into(),
            params: serde_json::json!({ "id": entity }),
            result: None,
            resource_id: None,
            actor: actor.into(),
        }
    }

    #[test]
    fn get_entity_missing_is_none() {
        let store = InMemoryStore::new();
        assert!(store.get_entity("TASK-9999").unwrap().is_none());
    }

    #[test]
    fn list_entities_filters_by_resolved_parent() {
        let store = InMemoryStore::new();
        let mut child = Entity::new("TASK-0002", "Child");
        child.parent_id = Some("EPIC-0001".into());
        let mut legacy = Entity::new("TASK-0003", "Legacy child");
        legacy.epic_id = Some("EPIC-0001".into());
        store.put_entity(Entity::new("EPIC-0001", "Parent"));
        store.put_entity(child);
        store.put_entity(legacy);

        let children = store
            .list_entities(&ListQuery {
                parent_id: Some("EPIC-0001".into()),
                limit: None,
            })
            .unwrap();
        let ids: Vec<&str> = children.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["TASK-0002", "TASK-0003"]);
    }

    #[test]
    fn parent_id_shadows_epic_id_in_listing() {
        let store = InMemoryStore::new();
        let mut entity = Entity::new("TASK-0004", "Moved");
        entity.parent_id = Some("FLDR-0001".into());
        entity.epic_id = Some("EPIC-0001".into());
        store.put_entity(entity);

        let by_epic = store
            .list_entities(&ListQuery {
                parent_id: Some("EPIC-0001".into()),
                limit: None,
            })
            .unwrap();
        assert!(by_epic.is_empty());

        let by_parent = store
            .list_entities(&ListQuery {
                parent_id: Some("FLDR-0001".into()),
                limit: None,
            })
            .unwrap();
        assert_eq!(by_parent.len(), 1);
    }

    #[test]
    fn read_operations_most_recent_first() {
        let store = InMemoryStore::new();
        store.record_operation(op(100, "create_task", "TASK-0001", "dev"));
        store.record_operation(op(300, "update_task", "TASK-0001", "dev"));
        store.record_operation(op(200, "update_task", "TASK-0002", "dev"));

        let all = store.read_operations(&LogQuery::default()).unwrap();
        let times: Vec<i64> = all.iter().map(|o| o.ts.timestamp()).collect();
        assert_eq!(times, vec![300, 200, 100]);

        let scoped = store
            .read_operations(&LogQuery {
                entity_id: Some("TASK-0001".into()),
                limit: Some(1),
            })
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].ts.timestamp(), 300);
    }

    #[test]
    fn entry_entity_id_prefers_resource_id() {
        let mut entry = op(1, "write_resource", "TASK-0001", "dev");
        entry.resource_id = Some("res://notes/design.md".into());
        assert_eq!(entry.entity_id(), Some("res://notes/design.md"));
        entry.resource_id = None;
        assert_eq!(entry.entity_id(), Some("TASK-0001"));
    }
}
