//! Fidelity-tiered projections and the assembled response shape.
//!
//! Every structure here is created fresh per request and discarded once the
//! response is serialized. [`Fidelity`] controls how much of an entity or
//! resource is included: `full` ⊇ `summary` ⊇ `reference` field sets, and a
//! one-step [`ContextEntity::downgrade`] moves down that ladder when the
//! token budget is tight. The internal fidelity tag itself is never
//! serialized to callers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Entity, EntityType, Reference, Resource, Status};

/// How much of an item is serialized: `Reference` < `Summary` < `Full`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fidelity {
    #[default]
    Reference,
    Summary,
    Full,
}

/// A fidelity-tiered projection of an [`Entity`].
#[derive(Debug, Clone, Serialize)]
pub struct ContextEntity {
    pub id: String,
    pub title: String,
    pub status: Status,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Relational hops from the focal entity, when reached via traversal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
    /// Ranking-engine score, present on semantically discovered items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocked_reason: Vec<String>,
    #[serde(skip)]
    pub fidelity: Fidelity,
}

impl ContextEntity {
    /// Project an entity at the given fidelity tier.
    pub fn project(entity: &Entity, fidelity: Fidelity, graph_depth: Option<u32>) -> Self {
        let mut projected = Self {
            id: entity.id.clone(),
            title: entity.title.clone(),
            status: entity.status,
            entity_type: entity.entity_type,
            parent_id: entity.effective_parent().map(str::to_string),
            graph_depth,
            created_at: None,
            updated_at: None,
            references: Vec::new(),
            relevance_score: None,
            description: None,
            evidence: Vec::new(),
            blocked_reason: Vec::new(),
            fidelity,
        };
        if fidelity >= Fidelity::Summary {
            projected.created_at = Some(entity.created_at);
            projected.updated_at = Some(entity.updated_at);
            projected.references = entity.references.clone();
        }
        if fidelity >= Fidelity::Full {
            projected.description = entity.description.clone();
            projected.evidence = entity.evidence.clone();
            projected.blocked_reason = entity.blocked_reason.clone();
        }
        projected
    }

    /// Attach a ranking score (semantic enrichment results).
    pub fn with_relevance(mut self, score: f64) -> Self {
        self.relevance_score = Some(score);
        self
    }

    /// Drop one fidelity tier, shedding the fields the lower tier omits.
    /// Returns `false` when already at `Reference`.
    pub fn downgrade(&mut self) -> bool {
        match self.fidelity {
            Fidelity::Full => {
                self.description = None;
                self.evidence.clear();
                self.blocked_reason.clear();
                self.fidelity = Fidelity::Summary;
                true
            }
            Fidelity::Summary => {
                self.created_at = None;
                self.updated_at = None;
                self.references.clear();
                self.relevance_score = None;
                self.fidelity = Fidelity::Reference;
                true
            }
            Fidelity::Reference => false,
        }
    }
}

/// A fidelity-tiered projection of a [`Resource`].
#[derive(Debug, Clone, Serialize)]
pub struct ContextResource {
    pub uri: String,
    pub title: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(skip)]
    pub fidelity: Fidelity,
}

impl ContextResource {
    /// Project a resource at the given fidelity tier.
    pub fn project(resource: &Resource, fidelity: Fidelity) -> Self {
        Self {
            uri: resource.id.clone(),
            title: resource.title.clone(),
            path: resource.path.clone(),
            snippet: (fidelity >= Fidelity::Summary)
                .then(|| truncate_preview(&resource.content, 160)),
            content: (fidelity >= Fidelity::Full).then(|| resource.content.clone()),
            relevance_score: None,
            fidelity,
        }
    }

    pub fn with_relevance(mut self, score: f64) -> Self {
        self.relevance_score = Some(score);
        self
    }

    /// Drop one fidelity tier. Returns `false` when already at `Reference`.
    pub fn downgrade(&mut self) -> bool {
        match self.fidelity {
            Fidelity::Full => {
                self.content = None;
                self.fidelity = Fidelity::Summary;
                true
            }
            Fidelity::Summary => {
                self.snippet = None;
                self.relevance_score = None;
                self.fidelity = Fidelity::Reference;
                true
            }
            Fidelity::Reference => false,
        }
    }
}

/// One line of recent history derived from an operation log entry.
#[derive(Debug, Clone, Serialize)]
pub struct ContextActivity {
    pub ts: DateTime<Utc>,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub actor: String,
    pub summary: String,
}

/// Digest of the most recent contiguous same-actor run of operations.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub actor: String,
    pub actor_type: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub operation_count: usize,
    pub summary: String,
}

/// Bookkeeping attached to every assembled response.
#[derive(Debug, Clone, Serialize)]
pub struct ContextMetadata {
    pub depth: u8,
    pub total_items: usize,
    pub token_estimate: usize,
    pub truncated: bool,
    pub stages_executed: Vec<String>,
    /// `"id"` when the focal argument resolved directly, `"search"` when it
    /// was recovered via the ranking engine.
    pub focal_resolved_from: String,
}

/// The assembled context bundle handed to the tool-serving layer.
#[derive(Debug, Clone, Serialize)]
pub struct ContextResponse {
    pub focal: ContextEntity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ContextEntity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContextEntity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub siblings: Vec<ContextEntity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cross_referenced: Vec<ContextEntity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub referenced_by: Vec<ContextEntity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<ContextEntity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub descendants: Vec<ContextEntity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<ContextEntity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_resources: Vec<ContextResource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub activity: Vec<ContextActivity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_summary: Option<SessionSummary>,
    pub metadata: ContextMetadata,
}

/// Truncate content to `max_chars`, appending `...` if truncated.
pub fn truncate_preview(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        content.to_string()
    } else {
        // Find a clean char boundary
        let end = content
            .char_indices()
            .take_while(|(i, _)| *i < max_chars)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max_chars);
        format!("{}...", &content[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_entity() -> Entity {
        let mut entity = Entity::new("TASK-0001", "Build dashboard");
        entity.description = Some("Big description".into());
        entity.evidence = vec!["commit abc123".into()];
        entity.blocked_reason = vec!["waiting on review".into()];
        entity.references = vec![Reference {
            url: "https://tracker/EPIC-0002".into(),
            title: None,
        }];
        entity.epic_id = Some("EPIC-0002".into());
        entity
    }

    #[test]
    fn fidelity_is_monotonic_in_information() {
        let entity = full_entity();
        let reference = ContextEntity::project(&entity, Fidelity::Reference, Some(2));
        let summary = ContextEntity::project(&entity, Fidelity::Summary, Some(2));
        let full = ContextEntity::project(&entity, Fidelity::Full, Some(2));

        assert!(reference.created_at.is_none());
        assert!(reference.description.is_none());
        assert!(summary.created_at.is_some());
        assert!(summary.description.is_none());
        assert!(!summary.references.is_empty());
        assert!(full.description.is_some());
        assert!(!full.evidence.is_empty());
        assert_eq!(full.parent_id.as_deref(), Some("EPIC-0002"));
    }

    #[test]
    fn downgrade_walks_the_ladder() {
        let entity = full_entity();
        let mut projected = ContextEntity::project(&entity, Fidelity::Full, None);
        assert!(projected.downgrade());
        assert_eq!(projected.fidelity, Fidelity::Summary);
        assert!(projected.description.is_none());
        assert!(projected.created_at.is_some());
        assert!(projected.downgrade());
        assert_eq!(projected.fidelity, Fidelity::Reference);
        assert!(projected.created_at.is_none());
        assert!(!projected.downgrade());
    }

    #[test]
    fn fidelity_tag_is_not_serialized() {
        let entity = full_entity();
        let projected = ContextEntity::project(&entity, Fidelity::Full, None);
        let json = serde_json::to_value(&projected).unwrap();
        assert!(json.get("fidelity").is_none());
        assert_eq!(json["type"], "task");
    }

    #[test]
    fn resource_tiers() {
        let resource = Resource {
            id: "res://notes/design".into(),
            path: "notes/design.md".into(),
            title: "Design notes".into(),
            content: "c".repeat(500),
        };
        let reference = ContextResource::project(&resource, Fidelity::Reference);
        assert!(reference.snippet.is_none() && reference.content.is_none());
        let summary = ContextResource::project(&resource, Fidelity::Summary);
        assert!(summary.snippet.is_some() && summary.content.is_none());
        let mut full = ContextResource::project(&resource, Fidelity::Full);
        assert!(full.content.is_some());
        assert!(full.downgrade());
        assert!(full.content.is_none() && full.snippet.is_some());
    }

    #[test]
    fn preview_truncation() {
        assert_eq!(truncate_preview("short", 80), "short");
        let long = "a".repeat(100);
        let preview = truncate_preview(&long, 80);
        assert_eq!(preview.len(), 83);
        assert!(preview.ends_with("..."));
    }
}
