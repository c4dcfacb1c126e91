//! Hybrid score fusion: normalize → weighted merge → coordination bonus.
//!
//! The lexical and vector retrievers each hand back retriever-local
//! [`ScoredHit`] lists. Fusion maps both into `[0, 1]`, takes a weighted sum
//! per document, then rewards documents matching *all* query terms so a weak
//! multi-term match can outrank a single strong one-term match.

use std::collections::HashMap;

use serde::Serialize;

use super::tokenizer::{query_terms, tokenize};

/// A single retrieval result with a retriever-local score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredHit {
    pub id: String,
    pub score: f64,
}

/// Relative weight of each retriever in [`linear_fusion`].
#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub text: f64,
    pub vector: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            text: 0.7,
            vector: 0.3,
        }
    }
}

/// Map scores into `[0, 1]` via min-max scaling.
///
/// Empty input stays empty. A single hit, or an all-equal list, maps to 1.0
/// throughout: a degenerate retriever is treated as maximally confident
/// rather than tripping a divide-by-zero.
pub fn minmax_normalize(hits: &[ScoredHit]) -> Vec<ScoredHit> {
    if hits.is_empty() {
        return Vec::new();
    }
    let min = hits.iter().map(|h| h.score).fold(f64::INFINITY, f64::min);
    let max = hits
        .iter()
        .map(|h| h.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    hits.iter()
        .map(|h| ScoredHit {
            id: h.id.clone(),
            score: if range > 0.0 {
                (h.score - min) / range
            } else {
                1.0
            },
        })
        .collect()
}

/// Weighted per-document sum of two normalized hit lists.
///
/// A document present in only one list contributes 0 for the other, so an
/// absent vector retriever degrades gracefully to pure lexical ranking.
/// Output is sorted by score descending, ties broken by id for determinism.
pub fn linear_fusion(
    text_hits: &[ScoredHit],
    vector_hits: &[ScoredHit],
    weights: FusionWeights,
) -> Vec<ScoredHit> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    for hit in minmax_normalize(text_hits) {
        *scores.entry(hit.id).or_insert(0.0) += weights.text * hit.score;
    }
    for hit in minmax_normalize(vector_hits) {
        *scores.entry(hit.id).or_insert(0.0) += weights.vector * hit.score;
    }
    let mut fused: Vec<ScoredHit> = scores
        .into_iter()
        .map(|(id, score)| ScoredHit { id, score })
        .collect();
    sort_hits(&mut fused);
    fused
}

/// Reward documents that cover more of a multi-term query.
///
/// Only applies when the query has two or more whitespace-separated terms.
/// Adds `body_coverage * body_weight + title_coverage * title_weight` to each
/// fused score, where coverage is the fraction of query terms found in the
/// tokenized body/title, then re-sorts descending.
pub fn apply_coordination_bonus<FText, FTitle>(
    hits: &mut Vec<ScoredHit>,
    query: &str,
    get_text: FText,
    get_title: FTitle,
    body_weight: f64,
    title_weight: f64,
) where
    FText: Fn(&str) -> String,
    FTitle: Fn(&str) -> String,
{
    let terms = query_terms(query);
    if terms.len() < 2 {
        return;
    }
    for hit in hits.iter_mut() {
        let body_tokens = tokenize(&get_text(&hit.id));
        let title_tokens = tokenize(&get_title(&hit.id));
        let body_matched = terms.iter().filter(|t| body_tokens.contains(*t)).count();
        let title_matched = terms.iter().filter(|t| title_tokens.contains(*t)).count();
        let body_coord = body_matched as f64 / terms.len() as f64;
        let title_coord = title_matched as f64 / terms.len() as f64;
        hit.score += body_coord * body_weight + title_coord * title_weight;
    }
    sort_hits(hits);
}

/// Descending by score, then ascending by id so equal scores are stable.
pub fn sort_hits(hits: &mut [ScoredHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}
