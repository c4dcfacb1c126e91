//! Context assembly: one focal entity expanded into a budgeted bundle.
//!
//! The pipeline runs fixed stages in order: relational expansion, cross-
//! reference resolution, semantic enrichment, the temporal overlay, session
//! memory, and finally token budgeting. Later stages consult the shared
//! visited set so the same entity never appears twice under different roles.
//! Optional stages degrade to empty output instead of failing the request.

pub mod budget;
pub mod crossref;
pub mod enrich;
pub mod graph;
pub mod temporal;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::config::{ContextConfig, MAX_DEPTH};
use crate::index::{DocKind, SearchIndex, SearchOptions};
use crate::model::Entity;
use crate::store::{EntityStore, OperationLog, ResourceStore};

use types::{ContextMetadata, ContextResponse, Fidelity};

pub use types::{
    ContextActivity, ContextEntity, ContextResource, SessionSummary,
};

/// What the caller wants assembled.
#[derive(Debug, Clone)]
pub struct ContextRequest {
    /// Entity id, or free text to recover one through the ranking engine.
    pub focal: String,
    /// Relational hop depth, clamped to 1–3. Defaults from configuration.
    pub depth: Option<u8>,
    /// Token ceiling override for this request.
    pub max_tokens: Option<usize>,
    pub include_semantic: bool,
    pub include_activity: bool,
    pub include_session: bool,
}

impl ContextRequest {
    pub fn new(focal: impl Into<String>) -> Self {
        Self {
            focal: focal.into(),
            depth: None,
            max_tokens: None,
            include_semantic: true,
            include_activity: true,
            include_session: true,
        }
    }
}

/// Assembles context bundles from the stores and the ranking engine.
///
/// Holds no per-request state; every assembly starts from a fresh visited
/// set, so concurrent calls are independent.
pub struct ContextPipeline {
    entities: Arc<dyn EntityStore>,
    resources: Arc<dyn ResourceStore>,
    log: Arc<dyn OperationLog>,
    index: Option<Arc<SearchIndex>>,
    config: ContextConfig,
}

impl ContextPipeline {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        resources: Arc<dyn ResourceStore>,
        log: Arc<dyn OperationLog>,
        config: ContextConfig,
    ) -> Self {
        Self {
            entities,
            resources,
            log,
            index: None,
            config,
        }
    }

    /// Attach a ranking engine, enabling focal recovery by search and the
    /// semantic enrichment stage.
    pub fn with_index(mut self, index: Arc<SearchIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Assemble a context bundle. `Ok(None)` when the focal argument
    /// resolves to nothing, by id or by search.
    pub fn assemble(&self, request: &ContextRequest) -> Result<Option<ContextResponse>> {
        let Some((focal, resolved_from)) = self.resolve_focal(&request.focal)? else {
            debug!(focal = %request.focal, "focal did not resolve");
            return Ok(None);
        };

        let depth = request
            .depth
            .unwrap_or(self.config.default_depth)
            .clamp(1, MAX_DEPTH);
        let max_tokens = request.max_tokens.unwrap_or(self.config.default_max_tokens);
        let mut visited: HashSet<String> = HashSet::from([focal.id.clone()]);
        let mut stages = Vec::new();

        let expansion = graph::expand(
            self.entities.as_ref(),
            self.resources.as_ref(),
            &focal,
            depth,
            &mut visited,
        )?;
        stages.push("relational".to_string());

        let refs = crossref::resolve(
            self.entities.as_ref(),
            &focal,
            self.config.crossref_limit,
            &mut visited,
        )?;
        stages.push("crossref".to_string());

        let enrichment = match (&self.index, request.include_semantic) {
            (Some(index), true) => {
                let enrichment = enrich::enrich(
                    self.entities.as_ref(),
                    self.resources.as_ref(),
                    index,
                    &focal,
                    self.config.semantic_entity_limit,
                    self.config.semantic_resource_limit,
                    &mut visited,
                )?;
                stages.push("semantic".to_string());
                enrichment
            }
            _ => enrich::SemanticEnrichment::default(),
        };

        let activity = if request.include_activity {
            let mut ids = vec![focal.id.clone()];
            if let Some(parent) = &expansion.parent {
                ids.push(parent.id.clone());
            }
            ids.extend(expansion.children.iter().map(|c| c.id.clone()));
            let activity =
                temporal::recent_activity(self.log.as_ref(), &ids, self.config.activity_limit)?;
            stages.push("activity".to_string());
            activity
        } else {
            Vec::new()
        };

        let session_summary = if request.include_session {
            let session = temporal::session_summary(
                self.log.as_ref(),
                &focal.id,
                self.config.session_gap_minutes,
            )?;
            stages.push("session".to_string());
            session
        } else {
            None
        };

        // Path-related and semantically related resources share one list.
        let mut related_resources = expansion.related_resources;
        let mut seen_uris: HashSet<String> =
            related_resources.iter().map(|r| r.uri.clone()).collect();
        for resource in enrichment.related_resources {
            if seen_uris.insert(resource.uri.clone()) {
                related_resources.push(resource);
            }
        }

        let mut response = ContextResponse {
            focal: ContextEntity::project(&focal, Fidelity::Full, None),
            parent: expansion.parent,
            children: expansion.children,
            siblings: expansion.siblings,
            cross_referenced: refs.cross_referenced,
            referenced_by: refs.referenced_by,
            ancestors: expansion.ancestors,
            descendants: expansion.descendants,
            related: enrichment.related,
            related_resources,
            activity,
            session_summary,
            metadata: ContextMetadata {
                depth,
                total_items: 0,
                token_estimate: 0,
                truncated: false,
                stages_executed: Vec::new(),
                focal_resolved_from: resolved_from.to_string(),
            },
        };

        let outcome = budget::allocate(&mut response, max_tokens);
        stages.push("budget".to_string());

        response.metadata.total_items = count_items(&response);
        response.metadata.token_estimate = outcome.token_estimate;
        response.metadata.truncated = outcome.truncated;
        response.metadata.stages_executed = stages;

        info!(
            focal = %response.focal.id,
            depth,
            items = response.metadata.total_items,
            tokens = response.metadata.token_estimate,
            truncated = response.metadata.truncated,
            "context assembled"
        );
        Ok(Some(response))
    }

    /// Id lookup first; on a miss, fall back to the ranking engine and take
    /// the best entity hit.
    fn resolve_focal(&self, focal: &str) -> Result<Option<(Entity, &'static str)>> {
        if let Some(entity) = self.entities.get_entity(focal)? {
            return Ok(Some((entity, "id")));
        }
        let Some(index) = &self.index else {
            return Ok(None);
        };
        let opts = SearchOptions {
            limit: Some(1),
            doc_kinds: Some(vec![
                DocKind::Task,
                DocKind::Epic,
                DocKind::Folder,
                DocKind::Artifact,
                DocKind::Milestone,
            ]),
            ..Default::default()
        };
        for item in index.search_all(focal, &opts)? {
            if let Some(entity) = self.entities.get_entity(item.id())? {
                return Ok(Some((entity, "search")));
            }
        }
        Ok(None)
    }
}

fn count_items(response: &ContextResponse) -> usize {
    1 + usize::from(response.parent.is_some())
        + response.children.len()
        + response.siblings.len()
        + response.cross_referenced.len()
        + response.referenced_by.len()
        + response.ancestors.len()
        + response.descendants.len()
        + response.related.len()
        + response.related_resources.len()
        + response.activity.len()
        + usize::from(response.session_summary.is_some())
}
