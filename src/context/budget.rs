//! Token budgeting over an assembled response.
//!
//! Costs use the chars/4 heuristic per populated field plus a fixed per-item
//! overhead for structural framing. Allocation walks the response in
//! priority order; an item that does not fit is downgraded one fidelity step
//! and retried once, and the first item that still does not fit stops its
//! tier and every lower tier in the chain, the session summary included.
//! Resources and activities run their own independent passes against
//! whatever budget remains.

use super::types::{
    ContextActivity, ContextEntity, ContextResource, ContextResponse, SessionSummary,
};

const ENTITY_OVERHEAD: usize = 12;
const RESOURCE_OVERHEAD: usize = 10;
const ACTIVITY_OVERHEAD: usize = 8;
const SESSION_OVERHEAD: usize = 16;
/// Serialized RFC 3339 timestamp, in tokens.
const TIMESTAMP_COST: usize = 5;

/// What allocation settled on.
#[derive(Debug, Clone, Copy)]
pub struct BudgetOutcome {
    pub token_estimate: usize,
    pub truncated: bool,
}

fn text_cost(text: &str) -> usize {
    text.len().div_ceil(4)
}

pub fn entity_cost(entity: &ContextEntity) -> usize {
    let mut cost = ENTITY_OVERHEAD + text_cost(&entity.id) + text_cost(&entity.title);
    if let Some(parent_id) = &entity.parent_id {
        cost += text_cost(parent_id);
    }
    if entity.created_at.is_some() {
        cost += TIMESTAMP_COST;
    }
    if entity.updated_at.is_some() {
        cost += TIMESTAMP_COST;
    }
    for reference in &entity.references {
        cost += text_cost(&reference.url);
        if let Some(title) = &reference.title {
            cost += text_cost(title);
        }
    }
    if let Some(description) = &entity.description {
        cost += text_cost(description);
    }
    for item in &entity.evidence {
        cost += text_cost(item);
    }
    for reason in &entity.blocked_reason {
        cost += text_cost(reason);
    }
    cost
}

pub fn resource_cost(resource: &ContextResource) -> usize {
    let mut cost = RESOURCE_OVERHEAD
        + text_cost(&resource.uri)
        + text_cost(&resource.title)
        + text_cost(&resource.path);
    if let Some(snippet) = &resource.snippet {
        cost += text_cost(snippet);
    }
    if let Some(content) = &resource.content {
        cost += text_cost(content);
    }
    cost
}

pub fn activity_cost(activity: &ContextActivity) -> usize {
    let mut cost = ACTIVITY_OVERHEAD
        + TIMESTAMP_COST
        + text_cost(&activity.tool)
        + text_cost(&activity.actor)
        + text_cost(&activity.summary);
    if let Some(entity_id) = &activity.entity_id {
        cost += text_cost(entity_id);
    }
    cost
}

pub fn session_cost(session: &SessionSummary) -> usize {
    SESSION_OVERHEAD
        + 2 * TIMESTAMP_COST
        + text_cost(&session.actor)
        + text_cost(&session.actor_type)
        + text_cost(&session.summary)
}

/// Fit the response into `max_tokens`, degrading and dropping in priority
/// order. The focal and its parent are always kept, even over budget.
///
/// Chain order: session summary, then children, siblings, cross-referenced,
/// referenced-by, ancestors, descendants, semantically related. The first
/// unfittable item stops its tier and every lower tier in the chain, so a
/// larger budget always keeps a superset of what a smaller one kept.
/// Resources and activities are budgeted independently afterwards.
pub fn allocate(response: &mut ContextResponse, max_tokens: usize) -> BudgetOutcome {
    let mut used = entity_cost(&response.focal);
    let mut truncated = false;
    let mut stopped = false;

    if let Some(parent) = &response.parent {
        used += entity_cost(parent);
    }

    if let Some(session) = &response.session_summary {
        let cost = session_cost(session);
        if used + cost <= max_tokens {
            used += cost;
        } else {
            response.session_summary = None;
            stopped = true;
            truncated = true;
        }
    }

    for tier in [
        &mut response.children,
        &mut response.siblings,
        &mut response.cross_referenced,
        &mut response.referenced_by,
        &mut response.ancestors,
        &mut response.descendants,
        &mut response.related,
    ] {
        fit_entities(tier, max_tokens, &mut used, &mut stopped, &mut truncated);
    }

    fit_resources(
        &mut response.related_resources,
        max_tokens,
        &mut used,
        &mut truncated,
    );
    fit_activities(&mut response.activity, max_tokens, &mut used, &mut truncated);

    BudgetOutcome {
        token_estimate: used,
        truncated: truncated || used > max_tokens,
    }
}

fn fit_entities(
    items: &mut Vec<ContextEntity>,
    max_tokens: usize,
    used: &mut usize,
    stopped: &mut bool,
    truncated: &mut bool,
) {
    if *stopped {
        if !items.is_empty() {
            items.clear();
            *truncated = true;
        }
        return;
    }
    let mut kept = 0;
    for item in items.iter_mut() {
        let mut cost = entity_cost(item);
        if *used + cost > max_tokens {
            if item.downgrade() {
                cost = entity_cost(item);
            }
            if *used + cost > max_tokens {
                *stopped = true;
                break;
            }
        }
        *used += cost;
        kept += 1;
    }
    if kept < items.len() {
        items.truncate(kept);
        *truncated = true;
    }
}

fn fit_resources(
    items: &mut Vec<ContextResource>,
    max_tokens: usize,
    used: &mut usize,
    truncated: &mut bool,
) {
    let mut kept = 0;
    for item in items.iter_mut() {
        let mut cost = resource_cost(item);
        if *used + cost > max_tokens {
            if item.downgrade() {
                cost = resource_cost(item);
            }
            if *used + cost > max_tokens {
                break;
            }
        }
        *used += cost;
        kept += 1;
    }
    if kept < items.len() {
        items.truncate(kept);
        *truncated = true;
    }
}

/// Activities are already terse one-liners; they fit or they are dropped.
fn fit_activities(
    items: &mut Vec<ContextActivity>,
    max_tokens: usize,
    used: &mut usize,
    truncated: &mut bool,
) {
    let mut kept = 0;
    for item in items.iter() {
        let cost = activity_cost(item);
        if *used + cost > max_tokens {
            break;
        }
        *used += cost;
        kept += 1;
    }
    if kept < items.len() {
        items.truncate(kept);
        *truncated = true;
    }
}
