//! Relational expansion: ancestors, descendants, siblings, related resources.
//!
//! All traversal shares one mutable visited set per request, seeded with the
//! focal id. Every resolved id is recorded before its edges are followed, so
//! traversal over a corpus with cyclic parent links (a data-integrity bug,
//! not a supported shape) still terminates in O(visited) steps, and no entity
//! ever appears under two relational roles.

use std::collections::HashSet;

use anyhow::Result;
use tracing::debug;

use crate::model::Entity;
use crate::store::{EntityStore, ListQuery, ResourceStore};

use super::types::{ContextEntity, ContextResource, Fidelity};

/// Structural neighborhood of the focal entity.
#[derive(Debug, Default)]
pub struct RelationalExpansion {
    /// Hop-1 ancestor, summary fidelity.
    pub parent: Option<ContextEntity>,
    /// Hop ≥2 ancestors, reference fidelity, tagged with graph depth.
    pub ancestors: Vec<ContextEntity>,
    /// Level-1 descendants, summary fidelity.
    pub children: Vec<ContextEntity>,
    /// Level ≥2 descendants, reference fidelity, tagged with graph depth.
    pub descendants: Vec<ContextEntity>,
    /// Other children of the focal's resolved parent, summary fidelity.
    pub siblings: Vec<ContextEntity>,
    /// Resources whose path mentions a visited entity id.
    pub related_resources: Vec<ContextResource>,
}

/// Expand the focal entity's neighborhood up to `depth` hops (1–3).
///
/// `visited` must already contain the focal id; every entity resolved here is
/// added to it in traversal order.
pub fn expand(
    entities: &dyn EntityStore,
    resources: &dyn ResourceStore,
    focal: &Entity,
    depth: u8,
    visited: &mut HashSet<String>,
) -> Result<RelationalExpansion> {
    let mut expansion = RelationalExpansion::default();

    collect_ancestors(entities, focal, depth, visited, &mut expansion)?;
    collect_descendants(entities, focal, depth, visited, &mut expansion)?;
    collect_siblings(entities, focal, visited, &mut expansion)?;
    expansion.related_resources = collect_related_resources(resources, visited)?;

    debug!(
        focal = %focal.id,
        depth,
        children = expansion.children.len(),
        siblings = expansion.siblings.len(),
        ancestors = expansion.ancestors.len(),
        descendants = expansion.descendants.len(),
        resources = expansion.related_resources.len(),
        "relational expansion complete"
    );
    Ok(expansion)
}

/// Walk resolved parents upward. Stops on a missing parent, an already
/// visited id, or depth exhaustion.
fn collect_ancestors(
    entities: &dyn EntityStore,
    focal: &Entity,
    depth: u8,
    visited: &mut HashSet<String>,
    expansion: &mut RelationalExpansion,
) -> Result<()> {
    let mut current_parent = focal.effective_parent().map(str::to_string);
    for hop in 1..=u32::from(depth) {
        let Some(parent_id) = current_parent else {
            break;
        };
        if visited.contains(&parent_id) {
            break;
        }
        let Some(parent) = entities.get_entity(&parent_id)? else {
            // Stale link; expected data drift
            break;
        };
        visited.insert(parent.id.clone());
        if hop == 1 {
            expansion.parent = Some(ContextEntity::project(&parent, Fidelity::Summary, None));
        } else {
            expansion
                .ancestors
                .push(ContextEntity::project(&parent, Fidelity::Reference, Some(hop)));
        }
        current_parent = parent.effective_parent().map(str::to_string);
    }
    Ok(())
}

/// Breadth-first by level from the focal id downward.
fn collect_descendants(
    entities: &dyn EntityStore,
    focal: &Entity,
    depth: u8,
    visited: &mut HashSet<String>,
    expansion: &mut RelationalExpansion,
) -> Result<()> {
    let mut frontier = vec![focal.id.clone()];
    for level in 1..=u32::from(depth) {
        let mut next_frontier = Vec::new();
        for parent_id in &frontier {
            let children = entities.list_entities(&ListQuery {
                parent_id: Some(parent_id.clone()),
                limit: None,
            })?;
            for child in children {
                if !visited.insert(child.id.clone()) {
                    continue;
                }
                if level == 1 {
                    expansion
                        .children
                        .push(ContextEntity::project(&child, Fidelity::Summary, None));
                } else {
                    expansion.descendants.push(ContextEntity::project(
                        &child,
                        Fidelity::Reference,
                        Some(level),
                    ));
                }
                next_frontier.push(child.id);
            }
        }
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }
    Ok(())
}

/// Other entities sharing the focal's resolved parent.
fn collect_siblings(
    entities: &dyn EntityStore,
    focal: &Entity,
    visited: &mut HashSet<String>,
    expansion: &mut RelationalExpansion,
) -> Result<()> {
    let Some(parent_id) = focal.effective_parent() else {
        return Ok(());
    };
    let peers = entities.list_entities(&ListQuery {
        parent_id: Some(parent_id.to_string()),
        limit: None,
    })?;
    for peer in peers {
        if peer.id == focal.id || !visited.insert(peer.id.clone()) {
            continue;
        }
        expansion
            .siblings
            .push(ContextEntity::project(&peer, Fidelity::Summary, None));
    }
    Ok(())
}

/// Path-containment heuristic: a resource is related when its storage path
/// mentions any visited entity id, case-insensitively. False positives are
/// possible and accepted.
fn collect_related_resources(
    resources: &dyn ResourceStore,
    visited: &HashSet<String>,
) -> Result<Vec<ContextResource>> {
    let lowered_ids: Vec<String> = visited.iter().map(|id| id.to_lowercase()).collect();
    let mut related = Vec::new();
    for resource in resources.list_resources()? {
        let path = resource.path.to_lowercase();
        if lowered_ids.iter().any(|id| path.contains(id.as_str())) {
            related.push(ContextResource::project(&resource, Fidelity::Summary));
        }
    }
    Ok(related)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Resource;
    use crate::store::InMemoryStore;

    fn child_of(id: &str, title: &str, parent: &str) -> Entity {
        let mut entity = Entity::new(id, title);
        entity.parent_id = Some(parent.to_string());
        entity
    }

    fn expand_from(store: &InMemoryStore, focal: &Entity, depth: u8) -> RelationalExpansion {
        let mut visited = HashSet::from([focal.id.clone()]);
        expand(store, store, focal, depth, &mut visited).unwrap()
    }

    #[test]
    fn parent_then_ancestors_by_hop() {
        let store = InMemoryStore::new();
        store.put_entity(Entity::new("FLDR-0001", "Root"));
        store.put_entity(child_of("EPIC-0001", "Epic", "FLDR-0001"));
        let focal = child_of("TASK-0001", "Leaf", "EPIC-0001");
        store.put_entity(focal.clone());

        let expansion = expand_from(&store, &focal, 3);
        assert_eq!(expansion.parent.as_ref().unwrap().id, "EPIC-0001");
        assert_eq!(expansion.parent.as_ref().unwrap().fidelity, Fidelity::Summary);
        assert_eq!(expansion.ancestors.len(), 1);
        assert_eq!(expansion.ancestors[0].id, "FLDR-0001");
        assert_eq!(expansion.ancestors[0].graph_depth, Some(2));
        assert_eq!(expansion.ancestors[0].fidelity, Fidelity::Reference);
    }

    #[test]
    fn ancestor_cycle_terminates() {
        let store = InMemoryStore::new();
        let a = child_of("TASK-0001", "A", "TASK-0002");
        let b = child_of("TASK-0002", "B", "TASK-0001");
        store.put_entity(a.clone());
        store.put_entity(b);

        let expansion = expand_from(&store, &a, 3);
        // B is the only ancestor; the loop back to A stops at the visited set
        assert_eq!(expansion.parent.as_ref().unwrap().id, "TASK-0002");
        assert!(expansion.ancestors.is_empty());
    }

    #[test]
    fn descendants_by_level() {
        let store = InMemoryStore::new();
        let focal = Entity::new("EPIC-0001", "Epic");
        store.put_entity(focal.clone());
        store.put_entity(child_of("TASK-0001", "Child", "EPIC-0001"));
        store.put_entity(child_of("TASK-0002", "Grandchild", "TASK-0001"));
        store.put_entity(child_of("TASK-0003", "Great-grandchild", "TASK-0002"));

        let shallow = expand_from(&store, &focal, 1);
        assert_eq!(shallow.children.len(), 1);
        assert!(shallow.descendants.is_empty());

        let deep = expand_from(&store, &focal, 3);
        assert_eq!(deep.children.len(), 1);
        let depths: Vec<Option<u32>> =
            deep.descendants.iter().map(|d| d.graph_depth).collect();
        assert_eq!(depths, vec![Some(2), Some(3)]);
    }

    #[test]
    fn siblings_exclude_focal_and_visited() {
        let store = InMemoryStore::new();
        store.put_entity(Entity::new("EPIC-0001", "Epic"));
        let focal = child_of("TASK-0001", "Focal", "EPIC-0001");
        store.put_entity(focal.clone());
        store.put_entity(child_of("TASK-0002", "Sibling", "EPIC-0001"));
        store.put_entity(child_of("TASK-0003", "Other sibling", "EPIC-0001"));

        let expansion = expand_from(&store, &focal, 1);
        let ids: Vec<&str> = expansion.siblings.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["TASK-0002", "TASK-0003"]);
    }

    #[test]
    fn no_entity_appears_under_two_roles() {
        // A two-node parent cycle makes TASK-0002 both the parent of the
        // focal and one of its children; the shared visited set keeps it in
        // the first role that resolved it.
        let store = InMemoryStore::new();
        let focal = child_of("TASK-0001", "Focal", "TASK-0002");
        store.put_entity(focal.clone());
        store.put_entity(child_of("TASK-0002", "Other", "TASK-0001"));

        let expansion = expand_from(&store, &focal, 2);
        assert_eq!(expansion.parent.as_ref().unwrap().id, "TASK-0002");
        assert!(expansion.children.is_empty());
        assert!(expansion.siblings.is_empty());
    }

    #[test]
    fn related_resources_match_visited_ids_in_path() {
        let store = InMemoryStore::new();
        let focal = Entity::new("TASK-0001", "Focal");
        store.put_entity(focal.clone());
        store.put_resource(Resource {
            id: "res://notes/a".into(),
            path: "notes/task-0001/design.md".into(),
            title: "Design".into(),
            content: "body".into(),
        });
        store.put_resource(Resource {
            id: "res://notes/b".into(),
            path: "notes/unrelated.md".into(),
            title: "Unrelated".into(),
            content: "body".into(),
        });

        let expansion = expand_from(&store, &focal, 1);
        assert_eq!(expansion.related_resources.len(), 1);
        assert_eq!(expansion.related_resources[0].uri, "res://notes/a");
    }
}
