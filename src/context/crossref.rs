//! Forward and reverse cross-reference resolution.
//!
//! Reference URLs may embed typed entity ids (`TASK-0042`, `EPIC-0007`).
//! Forward resolution scans the focal entity's (and its direct parent's)
//! references; reverse resolution builds a target→sources map from a full
//! corpus scan per request, so it always reflects corpus state at request
//! time. Stale ids are skipped silently: dangling links are expected data
//! drift, not faults.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::debug;

use crate::model::Entity;
use crate::store::EntityStore;

use super::types::{ContextEntity, Fidelity};

/// Typed-id pattern: known prefix, dash, at least four digits.
static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:TASK|EPIC|FLDR|ARTF|MLST)-\d{4,}").expect("id pattern is valid")
});

/// Extract every embedded entity id from free text, in match order.
/// Zero matches is an ordinary outcome, not an error.
pub fn extract_ids(text: &str) -> Vec<String> {
    ID_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Resolved cross-links in both directions, summary fidelity.
#[derive(Debug, Default)]
pub struct CrossReferences {
    /// Entities the focal (or its parent) points at.
    pub cross_referenced: Vec<ContextEntity>,
    /// Entities whose references point at the focal.
    pub referenced_by: Vec<ContextEntity>,
}

/// Resolve forward and reverse cross-references around the focal entity.
///
/// Reverse lookups are scoped to the focal only (not its parent or siblings)
/// to bound noise. Each direction is capped at `limit` results; everything
/// resolved lands in the shared visited set.
pub fn resolve(
    entities: &dyn EntityStore,
    focal: &Entity,
    limit: usize,
    visited: &mut HashSet<String>,
) -> Result<CrossReferences> {
    let mut refs = CrossReferences::default();

    // Forward: focal's own references plus its direct parent's.
    let mut forward_ids = referenced_ids(focal);
    if let Some(parent_id) = focal.effective_parent() {
        if let Some(parent) = entities.get_entity(parent_id)? {
            forward_ids.extend(referenced_ids(&parent));
        }
    }
    for id in forward_ids {
        if refs.cross_referenced.len() >= limit {
            break;
        }
        if id == focal.id || visited.contains(&id) {
            continue;
        }
        let Some(entity) = entities.get_entity(&id)? else {
            continue;
        };
        visited.insert(entity.id.clone());
        refs.cross_referenced
            .push(ContextEntity::project(&entity, Fidelity::Summary, None));
    }

    // Reverse: rebuilt per request from a full corpus scan.
    let reverse_index = build_reverse_index(entities)?;
    if let Some(sources) = reverse_index.get(&focal.id) {
        for source_id in sources {
            if refs.referenced_by.len() >= limit {
                break;
            }
            if visited.contains(source_id) {
                continue;
            }
            let Some(entity) = entities.get_entity(source_id)? else {
                continue;
            };
            visited.insert(entity.id.clone());
            refs.referenced_by
                .push(ContextEntity::project(&entity, Fidelity::Summary, None));
        }
    }

    debug!(
        focal = %focal.id,
        forward = refs.cross_referenced.len(),
        reverse = refs.referenced_by.len(),
        "cross-references resolved"
    );
    Ok(refs)
}

/// Ids embedded in an entity's reference URLs, deduplicated in order.
fn referenced_ids(entity: &Entity) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for reference in &entity.references {
        for id in extract_ids(&reference.url) {
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Map of target id → source ids, excluding self-references.
fn build_reverse_index(entities: &dyn EntityStore) -> Result<HashMap<String, Vec<String>>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for entity in entities.list_all_entities()? {
        for target in referenced_ids(&entity) {
            if target == entity.id {
                continue;
            }
            index.entry(target).or_default().push(entity.id.clone());
        }
    }
    Ok(index)
}
