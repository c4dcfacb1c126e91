//! Core work-item type definitions.
//!
//! Defines [`Status`] (workflow states), [`EntityType`] (the five tracked
//! item kinds), [`Entity`] (a full work-item record), [`Reference`] (an
//! explicit cross-link), and [`Resource`] (a non-entity document).
//!
//! Entities are created by the external storage layer and are read-only to
//! this crate: every module here only projects them, never mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow status of a work item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Blocked,
    Done,
    Cancelled,
}

impl Status {
    /// Stable string representation, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "blocked" => Ok(Self::Blocked),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("unknown status: {s}")),
        }
    }
}

/// Kind of a tracked work item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    #[default]
    Task,
    Epic,
    Folder,
    Artifact,
    Milestone,
}

impl EntityType {
    /// Stable string representation, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Epic => "epic",
            Self::Folder => "folder",
            Self::Artifact => "artifact",
            Self::Milestone => "milestone",
        }
    }

    /// Identifier prefix used by this kind (e.g. `TASK` in `TASK-0001`).
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Task => "TASK",
            Self::Epic => "EPIC",
            Self::Folder => "FLDR",
            Self::Artifact => "ARTF",
            Self::Milestone => "MLST",
        }
    }

    /// Resolve a kind from an identifier prefix.
    pub fn from_id_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "TASK" => Some(Self::Task),
            "EPIC" => Some(Self::Epic),
            "FLDR" => Some(Self::Folder),
            "ARTF" => Some(Self::Artifact),
            "MLST" => Some(Self::Milestone),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(Self::Task),
            "epic" => Ok(Self::Epic),
            "folder" => Ok(Self::Folder),
            "artifact" => Ok(Self::Artifact),
            "milestone" => Ok(Self::Milestone),
            _ => Err(format!("unknown entity type: {s}")),
        }
    }
}

/// An explicit cross-link carried by an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Link target. May embed typed entity ids (e.g. `.../TASK-0042`).
    pub url: String,
    /// Optional human-readable label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A work item tracked by the system.
///
/// All five kinds share this one record; `entity_type` discriminates, and the
/// kind-specific extras (`due_date`, `content_type`, `path`) are plain
/// optionals. Traversal, ranking, and budgeting operate on the shared fields
/// only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Typed, prefixed identifier (e.g. `TASK-0001`).
    pub id: String,

    /// Item title.
    pub title: String,

    /// Detailed description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Current workflow status.
    #[serde(default)]
    pub status: Status,

    /// Item kind.
    #[serde(rename = "type", default)]
    pub entity_type: EntityType,

    /// Generalized parent for hierarchical organization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Legacy alias for `parent_id`. Never consulted once `parent_id` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<String>,

    /// Ordered explicit cross-links.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,

    /// Reasons the item is blocked, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_reason: Vec<String>,

    /// Evidence notes attached to the item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,

    /// Target date (milestones).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    /// MIME-ish content type (artifacts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Storage path (artifacts, folders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Entity {
    /// Create a minimal entity with the given id and title.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: Status::default(),
            entity_type: EntityType::default(),
            parent_id: None,
            epic_id: None,
            references: Vec::new(),
            created_at: now,
            updated_at: now,
            blocked_reason: Vec::new(),
            evidence: Vec::new(),
            due_date: None,
            content_type: None,
            path: None,
        }
    }

    /// Resolved parent id: `parent_id` wins over the legacy `epic_id` for
    /// every filtering and graph operation.
    pub fn effective_parent(&self) -> Option<&str> {
        self.parent_id.as_deref().or(self.epic_id.as_deref())
    }
}

/// A non-entity document (design notes, attachments).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// URI-shaped identifier.
    pub id: String,
    /// Storage path.
    pub path: String,
    /// Document title.
    pub title: String,
    /// Full text content.
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serialization() {
        let json = serde_json::to_string(&Status::InProgress).unwrap();
        assert_eq!(json, r#""in_progress""#);
        assert_eq!("blocked".parse::<Status>().unwrap(), Status::Blocked);
        assert!("reticulating".parse::<Status>().is_err());
    }

    #[test]
    fn entity_type_prefix_roundtrip() {
        for et in [
            EntityType::Task,
            EntityType::Epic,
            EntityType::Folder,
            EntityType::Artifact,
            EntityType::Milestone,
        ] {
            assert_eq!(EntityType::from_id_prefix(et.id_prefix()), Some(et));
        }
        assert_eq!(EntityType::from_id_prefix("BUGS"), None);
    }

    #[test]
    fn entity_serialization_roundtrip() {
        let mut entity = Entity::new("TASK-0001", "Build dashboard");
        entity.references.push(Reference {
            url: "https://tracker/EPIC-0009".into(),
            title: Some("parent epic".into()),
        });
        let json = serde_json::to_string(&entity).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, entity.id);
        assert_eq!(back.references.len(), 1);
        assert_eq!(back.entity_type, EntityType::Task);
    }

    #[test]
    fn entity_type_field_renamed() {
        let json = r#"{"id":"EPIC-0001","title":"Q3 work","type":"epic","created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-01T00:00:00Z"}"#;
        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.entity_type, EntityType::Epic);
        assert_eq!(entity.status, Status::Open);
    }

    #[test]
    fn effective_parent_prefers_parent_id() {
        let mut entity = Entity::new("TASK-0002", "Wire up API");
        entity.epic_id = Some("EPIC-0001".into());
        assert_eq!(entity.effective_parent(), Some("EPIC-0001"));

        entity.parent_id = Some("FLDR-0003".into());
        assert_eq!(entity.effective_parent(), Some("FLDR-0003"));
    }
}
