//! Temporal overlay: recent activity lines and session memory.
//!
//! Both are derived on demand from the append-only operation log. Activity is
//! scoped to the entities already in the response (focal, parent, children);
//! session memory reads the focal entity's own history and reconstructs the
//! most recent contiguous run of same-actor operations on it. The log carries
//! no real session identifiers, so a run is cut wherever consecutive
//! operations are farther apart than the configured gap.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::store::{LogQuery, OperationEntry, OperationLog};

use super::types::{ContextActivity, SessionSummary};

/// Log entries pulled when reconstructing a session run.
const SESSION_SCAN_LIMIT: usize = 200;

/// Most recent operations touching any of `ids`, newest first.
///
/// Entries are deduplicated on (timestamp, resolved entity id) so an
/// operation recorded against both the focal and a child appears once.
pub fn recent_activity(
    log: &dyn OperationLog,
    ids: &[String],
    limit: usize,
) -> Result<Vec<ContextActivity>> {
    let mut entries = Vec::new();
    for id in ids {
        entries.extend(log.read_operations(&LogQuery {
            entity_id: Some(id.clone()),
            limit: Some(limit),
        })?);
    }
    entries.sort_by(|a, b| b.ts.cmp(&a.ts));

    let mut seen: HashSet<(DateTime<Utc>, Option<String>)> = HashSet::new();
    let mut activity = Vec::new();
    for entry in entries {
        if activity.len() >= limit {
            break;
        }
        if !seen.insert((entry.ts, entry.entity_id().map(str::to_string))) {
            continue;
        }
        activity.push(ContextActivity {
            ts: entry.ts,
            tool: entry.tool.clone(),
            entity_id: entry.entity_id().map(str::to_string),
            actor: entry.actor.clone(),
            summary: summarize_operation(&entry),
        });
    }
    debug!(entries = activity.len(), "activity overlay assembled");
    Ok(activity)
}

/// Reconstruct the most recent same-actor session run touching `entity_id`,
/// if any. Operations on unrelated entities never enter the run.
pub fn session_summary(
    log: &dyn OperationLog,
    entity_id: &str,
    gap_minutes: i64,
) -> Result<Option<SessionSummary>> {
    let entries = log.read_operations(&LogQuery {
        entity_id: Some(entity_id.to_string()),
        limit: Some(SESSION_SCAN_LIMIT),
    })?;
    let Some(latest) = entries.first() else {
        return Ok(None);
    };

    let gap = Duration::minutes(gap_minutes);
    let mut session: Vec<&OperationEntry> = vec![latest];
    for entry in entries.iter().skip(1) {
        let previous = session[session.len() - 1];
        if entry.actor != latest.actor || previous.ts - entry.ts > gap {
            break;
        }
        session.push(entry);
    }

    let summary = synthesize_session(&session);
    Ok(Some(SessionSummary {
        actor: latest.actor.clone(),
        actor_type: actor_type(&latest.actor).to_string(),
        started_at: session[session.len() - 1].ts,
        ended_at: latest.ts,
        operation_count: session.len(),
        summary,
    }))
}

/// Humans show up in the log as `user` or `human`; everything else is
/// assumed to be an agent.
fn actor_type(actor: &str) -> &'static str {
    let lowered = actor.to_lowercase();
    if lowered == "user" || lowered == "human" || lowered.starts_with("user:") {
        "user"
    } else {
        "agent"
    }
}

/// One line per operation, keyed on the tool name with salient detail from
/// the parameters when present.
fn summarize_operation(entry: &OperationEntry) -> String {
    let tool = entry.tool.to_lowercase();
    let target = entry.entity_id().unwrap_or("item");

    if tool.contains("create") {
        return format!("created {target}");
    }
    if tool.contains("delete") {
        return format!("deleted {target}");
    }
    if tool.contains("write") || entry.resource_id.is_some() {
        return format!("wrote {target}");
    }
    if tool.contains("update") {
        if let Some(status) = entry.params.get("status").and_then(|v| v.as_str()) {
            return format!("moved {target} to {status}");
        }
        if entry.params.get("title").is_some() {
            return format!("retitled {target}");
        }
        if entry.params.get("evidence").is_some() {
            return format!("recorded evidence on {target}");
        }
        if let Some(reasons) = entry.params.get("blocked_reason") {
            let cleared = reasons.as_array().is_some_and(|a| a.is_empty());
            return if cleared {
                format!("unblocked {target}")
            } else {
                format!("blocked {target}")
            };
        }
        return format!("updated {target}");
    }
    format!("{} on {target}", entry.tool)
}

/// Digest of a session run: creations first, then final status moves, then
/// an evidence flag, falling back to a bare operation count.
fn synthesize_session(session: &[&OperationEntry]) -> String {
    let mut created = Vec::new();
    let mut final_status: HashMap<String, String> = HashMap::new();
    let mut evidence = false;

    // Oldest first so the last status write per entity wins.
    for entry in session.iter().rev() {
        let tool = entry.tool.to_lowercase();
        let Some(id) = entry.entity_id() else {
            continue;
        };
        if tool.contains("create") {
            created.push(id.to_string());
            continue;
        }
        if let Some(status) = entry.params.get("status").and_then(|v| v.as_str()) {
            final_status.insert(id.to_string(), status.to_string());
        }
        if entry.params.get("evidence").is_some() {
            evidence = true;
        }
    }

    let mut parts = Vec::new();
    if !created.is_empty() {
        parts.push(format!("created {}", created.join(", ")));
    }
    let mut moves: Vec<String> = final_status
        .iter()
        .map(|(id, status)| format!("moved {id} to {status}"))
        .collect();
    moves.sort();
    parts.extend(moves);
    if evidence {
        parts.push("recorded evidence".to_string());
    }
    if parts.is_empty() {
        format!("{} updates", session.len())
    } else {
        parts.join("; ")
    }
}
