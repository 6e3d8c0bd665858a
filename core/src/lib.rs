//! Hybrid (semantic + lexical) relevance indexing and search over JSONL records.
//!
//! The build path (`builder`) turns a one-JSON-object-per-line file into a
//! persisted index: normalized documents with embeddings plus a keyword
//! statistics snapshot. The query path (`scorer`) loads that index and ranks
//! documents by a weighted blend of cosine similarity, tf-idf keyword score,
//! and title relevance. Both paths share the exact same text normalizer
//! (`preprocess`); diverging them would silently break keyword scoring.

pub mod builder;
pub mod embedding;
pub mod error;
pub mod expand;
pub mod keyword;
pub mod persist;
pub mod preprocess;
pub mod scorer;

use serde::{Deserialize, Serialize};

pub type DocId = u32;

/// One indexed record. Ids are dense and contiguous: they are assigned in
/// input order, and only to records that passed validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub content: String,
    pub normalized_title: String,
    pub normalized_content: String,
    pub content_embedding: Vec<f32>,
    /// Present only when the index was built with title boost and the
    /// normalized title is non-empty.
    #[serde(default)]
    pub title_embedding: Option<Vec<f32>>,
    /// The raw source line, kept verbatim as an opaque passthrough.
    pub original: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub created_at: String,
    pub source: String,
    pub content_field: String,
    pub title_field: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub title_boost: bool,
    pub num_docs: u32,
}

/// An index loaded back from its two persisted artifacts, read-only during
/// search. Rebuilds go to a fresh directory; there is no in-place mutation.
#[derive(Debug)]
pub struct LoadedIndex {
    pub metadata: IndexMetadata,
    pub documents: Vec<Document>,
    pub keywords: keyword::KeywordIndex,
}
