//! Retrieval and context assembly for an agent-facing task tracker.
//!
//! Taskscope turns a corpus of tracker entities (tasks, epics, folders,
//! artifacts, milestones), attached resources, and an append-only operation
//! log into two things an agent can consume:
//!
//! - **Search**: a hybrid ranking engine combining lexical matching over a
//!   compound-aware inverted index with optional vector similarity, merged
//!   by weighted score fusion and sharpened with a term-coverage bonus.
//! - **Context**: a staged pipeline that expands one focal entity into a
//!   budgeted bundle of relatives, cross-references, similar items, recent
//!   activity, and session memory, degrading fidelity before dropping items
//!   when the token ceiling is tight.
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`model`] — Tracker entities, resources, and their typed-id scheme
//! - [`store`] — Storage traits the engine reads through, plus an in-memory store
//! - [`index`] — Tokenizer, inverted index, score fusion, and the search API
//! - [`embedding`] — Pluggable vector-embedding provider seam
//! - [`context`] — The context-assembly pipeline and its fidelity-tiered output

pub mod config;
pub mod context;
pub mod embedding;
pub mod index;
pub mod model;
pub mod store;
