//! Semantic enrichment: surface corpus items that are textually similar to
//! the focal entity but not structurally connected to it.
//!
//! The query is derived from the focal's title and the head of its
//! description, then run through the ranking engine twice, once scoped to
//! entities and once to resources. A failing or absent index degrades this
//! stage to an empty result rather than failing the whole request.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use tracing::warn;

use crate::index::{DocKind, SearchIndex, SearchItem, SearchOptions};
use crate::model::Entity;
use crate::store::{EntityStore, ResourceStore};

use super::types::{ContextEntity, ContextResource, Fidelity};

/// Description prefix folded into the derived query.
const QUERY_DESCRIPTION_CHARS: usize = 200;

/// Similar-but-unconnected items discovered by the ranking engine.
#[derive(Debug, Default)]
pub struct SemanticEnrichment {
    /// Entities, summary fidelity, carrying their relevance scores.
    pub related: Vec<ContextEntity>,
    /// Resources, summary fidelity, carrying their relevance scores.
    pub related_resources: Vec<ContextResource>,
}

/// Run semantic discovery around the focal entity.
///
/// Everything already in `visited` is excluded; discovered entity ids are
/// added to it. Resource hits never enter the visited set, their ids live in
/// a different namespace.
pub fn enrich(
    entities: &dyn EntityStore,
    resources: &dyn ResourceStore,
    index: &SearchIndex,
    focal: &Entity,
    entity_limit: usize,
    resource_limit: usize,
    visited: &mut HashSet<String>,
) -> Result<SemanticEnrichment> {
    let query = derive_query(focal);
    if query.trim().is_empty() {
        return Ok(SemanticEnrichment::default());
    }

    let mut enrichment = SemanticEnrichment::default();

    // Over-fetch so that visited hits do not starve the result set.
    let entity_opts = SearchOptions {
        limit: Some(entity_limit + visited.len()),
        doc_kinds: Some(vec![
            DocKind::Task,
            DocKind::Epic,
            DocKind::Folder,
            DocKind::Artifact,
            DocKind::Milestone,
        ]),
        ..Default::default()
    };
    let entity_hits = match index.search_all(&query, &entity_opts) {
        Ok(hits) => hits,
        Err(err) => {
            warn!(focal = %focal.id, error = %err, "entity enrichment search failed");
            return Ok(enrichment);
        }
    };
    for item in entity_hits {
        if enrichment.related.len() >= entity_limit {
            break;
        }
        if visited.contains(item.id()) {
            continue;
        }
        let Some(entity) = entities.get_entity(item.id())? else {
            continue;
        };
        visited.insert(entity.id.clone());
        enrichment.related.push(
            ContextEntity::project(&entity, Fidelity::Summary, None).with_relevance(item.score()),
        );
    }

    let resource_opts = SearchOptions {
        limit: Some(resource_limit),
        doc_kinds: Some(vec![DocKind::Resource]),
        ..Default::default()
    };
    let resource_hits = match index.search_all(&query, &resource_opts) {
        Ok(hits) => hits,
        Err(err) => {
            warn!(focal = %focal.id, error = %err, "resource enrichment search failed");
            return Ok(enrichment);
        }
    };
    let by_id: HashMap<String, _> = resources
        .list_resources()?
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect();
    for item in resource_hits {
        if enrichment.related_resources.len() >= resource_limit {
            break;
        }
        let SearchItem::Resource(hit) = item else {
            continue;
        };
        let Some(resource) = by_id.get(&hit.id) else {
            continue;
        };
        enrichment
            .related_resources
            .push(ContextResource::project(resource, Fidelity::Summary).with_relevance(hit.score));
    }

    Ok(enrichment)
}

/// Title plus the head of the description, joined with a space.
fn derive_query(focal: &Entity) -> String {
    let mut query = focal.title.clone();
    if let Some(description) = &focal.description {
        let head: String = description.chars().take(QUERY_DESCRIPTION_CHARS).collect();
        if !head.trim().is_empty() {
            query.push(' ');
            query.push_str(&head);
        }
    }
    query
}
