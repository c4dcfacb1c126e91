//! Indexing & ranking engine.
//!
//! [`SearchIndex`] owns an in-memory inverted index over entity and resource
//! free text, exact-match structured fields (status, type, resolved parent),
//! and optional per-document embeddings for the vector retriever. Searches
//! run the hybrid pipeline: lexical retrieval → vector retrieval → min-max
//! normalization → linear fusion → coordination bonus → truncate.
//!
//! Two correctness properties anchor the design:
//!
//! - Structured fields are never tokenized into free text, so a query string
//!   equal to an enum value (`"open"`, `"epic"`) matches only documents whose
//!   prose contains that term.
//! - Structured filters are evaluated while candidates are collected, before
//!   any limit, so a sparse filtered subset is never lost to an unfiltered
//!   top-k window.

pub mod fusion;
pub mod tokenizer;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::model::{Entity, EntityType, Resource, Status};
use fusion::{apply_coordination_bonus, linear_fusion, sort_hits, FusionWeights, ScoredHit};
use tokenizer::tokenize;

// ── Public types ──────────────────────────────────────────────────────────────

/// Kind of an indexed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocKind {
    Task,
    Epic,
    Folder,
    Artifact,
    Milestone,
    Resource,
}

impl DocKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Epic => "epic",
            Self::Folder => "folder",
            Self::Artifact => "artifact",
            Self::Milestone => "milestone",
            Self::Resource => "resource",
        }
    }
}

impl From<EntityType> for DocKind {
    fn from(value: EntityType) -> Self {
        match value {
            EntityType::Task => Self::Task,
            EntityType::Epic => Self::Epic,
            EntityType::Folder => Self::Folder,
            EntityType::Artifact => Self::Artifact,
            EntityType::Milestone => Self::Milestone,
        }
    }
}

/// Ranking order for [`SearchIndex::search`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    /// Hybrid relevance score (default).
    #[default]
    Relevance,
    /// Most recently updated first.
    Updated,
}

/// Search options: structured filters, result cap, document kinds, ordering.
///
/// Filters are predicates over the exact-match fields and are applied while
/// candidates are collected, never after truncation.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Maximum ranked results to return. Falls back to the configured default.
    pub limit: Option<usize>,
    /// Keep only documents in one of these statuses.
    pub status: Option<Vec<Status>>,
    /// Keep only documents of this entity type.
    pub entity_type: Option<EntityType>,
    /// Keep only documents whose resolved parent equals this id. Callers
    /// filtering by the legacy `epic_id` pass the epic id here; an entity
    /// whose `parent_id` points elsewhere will not match.
    pub parent_id: Option<String>,
    /// Keep only these document kinds.
    pub doc_kinds: Option<Vec<DocKind>>,
    /// Ranking order.
    pub sort: SortMode,
}

/// Entity hit in a [`SearchItem`].
#[derive(Debug, Clone, Serialize)]
pub struct EntityHit {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub status: Status,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Resource hit in a [`SearchItem`].
#[derive(Debug, Clone, Serialize)]
pub struct ResourceHit {
    pub id: String,
    pub title: String,
    pub path: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Tagged search result for [`SearchIndex::search_all`].
///
/// Folder, artifact, and milestone hits surface under `Task` — callers treat
/// every non-epic entity as a plain work item.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchItem {
    Task(EntityHit),
    Epic(EntityHit),
    Resource(ResourceHit),
}

impl SearchItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Task(h) | Self::Epic(h) => &h.id,
            Self::Resource(h) => &h.id,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            Self::Task(h) | Self::Epic(h) => h.score,
            Self::Resource(h) => h.score,
        }
    }
}

/// Index size counters.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub terms: usize,
    pub by_kind: HashMap<String, usize>,
}

// ── Internal document representation ──────────────────────────────────────────

struct IndexedDoc {
    kind: DocKind,
    title: String,
    /// Concatenated free text: everything tokenized, nothing structured.
    text: String,
    terms: HashSet<String>,
    title_terms: HashSet<String>,
    status: Option<Status>,
    entity_type: Option<EntityType>,
    /// Resolved parent (`parent_id` over `epic_id`).
    parent: Option<String>,
    /// Storage path (resources only).
    path: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    embedding: Option<Vec<f32>>,
}

impl IndexedDoc {
    fn matches(&self, opts: &SearchOptions) -> bool {
        if let Some(kinds) = &opts.doc_kinds {
            if !kinds.contains(&self.kind) {
                return false;
            }
        }
        if let Some(statuses) = &opts.status {
            match self.status {
                Some(s) if statuses.contains(&s) => {}
                _ => return false,
            }
        }
        if let Some(et) = opts.entity_type {
            if self.entity_type != Some(et) {
                return false;
            }
        }
        if let Some(parent) = &opts.parent_id {
            if self.parent.as_deref() != Some(parent.as_str()) {
                return false;
            }
        }
        true
    }
}

#[derive(Default)]
struct Inner {
    docs: HashMap<String, IndexedDoc>,
    /// term → ids of documents whose free text contains it.
    postings: HashMap<String, HashSet<String>>,
}

impl Inner {
    fn insert(&mut self, id: String, doc: IndexedDoc) {
        self.remove(&id);
        for term in &doc.terms {
            self.postings.entry(term.clone()).or_default().insert(id.clone());
        }
        self.docs.insert(id, doc);
    }

    fn remove(&mut self, id: &str) -> bool {
        let Some(doc) = self.docs.remove(id) else {
            return false;
        };
        for term in &doc.terms {
            if let Some(ids) = self.postings.get_mut(term) {
                ids.remove(id);
                if ids.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        true
    }
}

// ── Search index ──────────────────────────────────────────────────────────────

/// Hybrid lexical + vector search over the tracked corpus.
///
/// Interior locking follows the single-writer/multiple-reader discipline:
/// searches take the read lock, document writes take the write lock, and
/// every write is a whole-document replace keyed by id.
pub struct SearchIndex {
    inner: RwLock<Inner>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    weights: FusionWeights,
    body_coordination: f64,
    title_coordination: f64,
    default_limit: usize,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            embedder: None,
            weights: FusionWeights::default(),
            body_coordination: 0.5,
            title_coordination: 0.3,
            default_limit: 20,
        }
    }

    /// Build an index with weights and limits from configuration.
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            embedder: None,
            weights: FusionWeights {
                text: config.text_weight,
                vector: config.vector_weight,
            },
            body_coordination: config.body_coordination_weight,
            title_coordination: config.title_coordination_weight,
            default_limit: config.default_limit,
        }
    }

    /// Attach a vector retriever. Without one, searches run lexical-only.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    // ── Write path ────────────────────────────────────────────────────────

    /// Index a batch of entities. Ranked output is identical to adding the
    /// same entities one at a time in the same order: scoring reads only the
    /// corpus state at query time.
    pub fn index_entities(&self, entities: &[Entity]) -> Result<()> {
        for entity in entities {
            self.add_entity(entity)?;
        }
        Ok(())
    }

    /// Index a batch of resources.
    pub fn index_resources(&self, resources: &[Resource]) -> Result<()> {
        for resource in resources {
            self.add_resource(resource)?;
        }
        Ok(())
    }

    /// Insert or replace a single entity document.
    pub fn add_entity(&self, entity: &Entity) -> Result<()> {
        let doc = self.build_entity_doc(entity)?;
        self.write()?.insert(entity.id.clone(), doc);
        Ok(())
    }

    /// Replace an entity document. Alias of [`add_entity`](Self::add_entity):
    /// every write is a single-document replace keyed by id.
    pub fn update_entity(&self, entity: &Entity) -> Result<()> {
        self.add_entity(entity)
    }

    /// Insert or replace a single resource document.
    pub fn add_resource(&self, resource: &Resource) -> Result<()> {
        let text = format!("{}\n{}", resource.title, resource.content);
        let embedding = self.embed_text(&text)?;
        let doc = IndexedDoc {
            kind: DocKind::Resource,
            title: resource.title.clone(),
            terms: tokenize(&text),
            title_terms: tokenize(&resource.title),
            text,
            status: None,
            entity_type: None,
            parent: None,
            path: Some(resource.path.clone()),
            updated_at: None,
            embedding,
        };
        self.write()?.insert(resource.id.clone(), doc);
        Ok(())
    }

    /// Remove a document by id. Returns `false` when the id was not indexed.
    pub fn remove_document(&self, id: &str) -> Result<bool> {
        Ok(self.write()?.remove(id))
    }

    /// Clear the index and load a fresh corpus.
    pub fn rebuild(&self, entities: &[Entity], resources: &[Resource]) -> Result<()> {
        {
            let mut inner = self.write()?;
            inner.docs.clear();
            inner.postings.clear();
        }
        self.index_entities(entities)?;
        self.index_resources(resources)?;
        debug!(
            entities = entities.len(),
            resources = resources.len(),
            "index rebuilt"
        );
        Ok(())
    }

    /// Document and term counters.
    pub fn stats(&self) -> Result<IndexStats> {
        let inner = self.read()?;
        let mut by_kind: HashMap<String, usize> = HashMap::new();
        for doc in inner.docs.values() {
            *by_kind.entry(doc.kind.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(IndexStats {
            documents: inner.docs.len(),
            terms: inner.postings.len(),
            by_kind,
        })
    }

    // ── Read path ─────────────────────────────────────────────────────────

    /// Ranked search over the corpus.
    ///
    /// Filters are evaluated over the full candidate set before the limit is
    /// applied. An empty query with filters returns every matching document,
    /// most recently updated first. A query with no matches returns an empty
    /// list, not an error.
    pub fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<ScoredHit>> {
        let limit = opts.limit.unwrap_or(self.default_limit);
        let query_embedding = self.embed_query(query);
        let inner = self.read()?;

        let query_term_set = tokenize(query);
        let mut hits = if query_term_set.is_empty() {
            Self::match_all(&inner, opts)
        } else {
            let lexical = Self::lexical_hits(&inner, &query_term_set, opts);
            let vector = Self::vector_hits(&inner, query_embedding.as_deref(), opts);
            let mut fused = linear_fusion(&lexical, &vector, self.weights);
            apply_coordination_bonus(
                &mut fused,
                query,
                |id| inner.docs.get(id).map(|d| d.text.clone()).unwrap_or_default(),
                |id| inner.docs.get(id).map(|d| d.title.clone()).unwrap_or_default(),
                self.body_coordination,
                self.title_coordination,
            );
            fused
        };

        if opts.sort == SortMode::Updated {
            hits.sort_by(|a, b| {
                let ta = inner.docs.get(&a.id).and_then(|d| d.updated_at);
                let tb = inner.docs.get(&b.id).and_then(|d| d.updated_at);
                tb.cmp(&ta).then_with(|| a.id.cmp(&b.id))
            });
        }
        hits.truncate(limit);
        debug!(query, results = hits.len(), "search complete");
        Ok(hits)
    }

    /// Ranked search returning tagged task/epic/resource items with snippets.
    pub fn search_all(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchItem>> {
        let hits = self.search(query, opts)?;
        let inner = self.read()?;
        let terms = tokenize(query);
        let mut items = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(doc) = inner.docs.get(&hit.id) else {
                continue;
            };
            let snippet = make_snippet(&doc.text, &terms);
            let item = match doc.kind {
                DocKind::Resource => SearchItem::Resource(ResourceHit {
                    id: hit.id,
                    title: doc.title.clone(),
                    path: doc.path.clone().unwrap_or_default(),
                    score: hit.score,
                    snippet,
                }),
                kind => {
                    let entity_hit = EntityHit {
                        id: hit.id,
                        title: doc.title.clone(),
                        entity_type: doc.entity_type.unwrap_or_default(),
                        status: doc.status.unwrap_or_default(),
                        score: hit.score,
                        snippet,
                    };
                    if kind == DocKind::Epic {
                        SearchItem::Epic(entity_hit)
                    } else {
                        SearchItem::Task(entity_hit)
                    }
                }
            };
            items.push(item);
        }
        Ok(items)
    }

    // ── Retrievers ────────────────────────────────────────────────────────

    /// Lexical retriever: BM25-style idf summed over matched query terms,
    /// titles weighted double. Term sets are deduplicated, so there is no tf
    /// component; the coordination bonus supplies multi-term discrimination.
    fn lexical_hits(
        inner: &Inner,
        query_terms: &HashSet<String>,
        opts: &SearchOptions,
    ) -> Vec<ScoredHit> {
        let total_docs = inner.docs.len() as f64;
        let mut scores: HashMap<&str, f64> = HashMap::new();
        for term in query_terms {
            let Some(ids) = inner.postings.get(term) else {
                continue;
            };
            let df = ids.len() as f64;
            let idf = (1.0 + (total_docs - df + 0.5) / (df + 0.5)).ln();
            for id in ids {
                let Some(doc) = inner.docs.get(id) else {
                    continue;
                };
                if !doc.matches(opts) {
                    continue;
                }
                let field_weight = if doc.title_terms.contains(term) { 2.0 } else { 1.0 };
                *scores.entry(id.as_str()).or_insert(0.0) += idf * field_weight;
            }
        }
        let mut hits: Vec<ScoredHit> = scores
            .into_iter()
            .map(|(id, score)| ScoredHit {
                id: id.to_string(),
                score,
            })
            .collect();
        sort_hits(&mut hits);
        hits
    }

    /// Vector retriever: cosine similarity of the query embedding against
    /// every filter-matching document that carries an embedding.
    fn vector_hits(
        inner: &Inner,
        query_embedding: Option<&[f32]>,
        opts: &SearchOptions,
    ) -> Vec<ScoredHit> {
        let Some(query_embedding) = query_embedding else {
            return Vec::new();
        };
        let mut hits: Vec<ScoredHit> = inner
            .docs
            .iter()
            .filter(|(_, doc)| doc.matches(opts))
            .filter_map(|(id, doc)| {
                let embedding = doc.embedding.as_deref()?;
                let score = cosine_similarity(query_embedding, embedding);
                (score > 0.0).then(|| ScoredHit {
                    id: id.clone(),
                    score,
                })
            })
            .collect();
        sort_hits(&mut hits);
        hits
    }

    /// Empty-query path: every filter-matching document, most recently
    /// updated first, score zero.
    fn match_all(inner: &Inner, opts: &SearchOptions) -> Vec<ScoredHit> {
        let mut matched: Vec<(&String, Option<DateTime<Utc>>)> = inner
            .docs
            .iter()
            .filter(|(_, doc)| doc.matches(opts))
            .map(|(id, doc)| (id, doc.updated_at))
            .collect();
        matched.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        matched
            .into_iter()
            .map(|(id, _)| ScoredHit {
                id: id.clone(),
                score: 0.0,
            })
            .collect()
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    fn build_entity_doc(&self, entity: &Entity) -> Result<IndexedDoc> {
        let text = entity_free_text(entity);
        let embedding = self.embed_text(&text)?;
        Ok(IndexedDoc {
            kind: entity.entity_type.into(),
            title: entity.title.clone(),
            terms: tokenize(&text),
            title_terms: tokenize(&entity.title),
            text,
            status: Some(entity.status),
            entity_type: Some(entity.entity_type),
            parent: entity.effective_parent().map(str::to_string),
            path: entity.path.clone(),
            updated_at: Some(entity.updated_at),
            embedding,
        })
    }

    fn embed_text(&self, text: &str) -> Result<Option<Vec<f32>>> {
        match &self.embedder {
            Some(embedder) => Ok(Some(embedder.embed(text)?)),
            None => Ok(None),
        }
    }

    /// Embed the query, degrading to lexical-only on provider failure.
    fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(query) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "query embedding failed, searching lexical-only");
                None
            }
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| anyhow::anyhow!("index lock poisoned: {e}"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| anyhow::anyhow!("index lock poisoned: {e}"))
    }
}

/// Everything that gets tokenized for an entity. Status, type, and parent are
/// structured fields and deliberately absent.
fn entity_free_text(entity: &Entity) -> String {
    let mut parts: Vec<&str> = vec![entity.title.as_str()];
    if let Some(description) = &entity.description {
        parts.push(description);
    }
    for evidence in &entity.evidence {
        parts.push(evidence);
    }
    for reason in &entity.blocked_reason {
        parts.push(reason);
    }
    for reference in &entity.references {
        if let Some(title) = &reference.title {
            parts.push(title);
        }
        parts.push(&reference.url);
    }
    parts.join("\n")
}

/// ±60 chars of raw text around the first matched query term.
fn make_snippet(text: &str, query_terms: &HashSet<String>) -> Option<String> {
    let pos = query_terms
        .iter()
        .filter_map(|t| find_term_start(text, t))
        .min()?;
    let start = floor_char_boundary(text, pos.saturating_sub(60));
    let end = ceil_char_boundary(text, (pos + 60).min(text.len()));
    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.push_str(text[start..end].trim());
    if end < text.len() {
        snippet.push_str("...");
    }
    Some(snippet)
}

/// Byte offset of the first case-insensitive occurrence of `term` in `text`.
///
/// Matching folds `text` char by char against the already-lowercase term, so
/// the returned offset is valid in the original bytes even where lowercasing
/// changes a character's byte length (e.g. `İ`).
fn find_term_start(text: &str, term: &str) -> Option<usize> {
    if term.is_empty() {
        return None;
    }
    text.char_indices()
        .map(|(i, _)| i)
        .find(|&start| term_matches_at(text, start, term))
}

fn term_matches_at(text: &str, start: usize, term: &str) -> bool {
    let mut wanted = term.chars();
    let mut need = wanted.next();
    for c in text[start..].chars() {
        for folded in c.to_lowercase() {
            match need {
                Some(t) if t == folded => need = wanted.next(),
                Some(_) => return false,
                None => return true,
            }
        }
        if need.is_none() {
            return true;
        }
    }
    false
}

fn floor_char_boundary(text: &str, mut i: usize) -> usize {
    while i > 0 && !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}
