use crate::embedding::TextEmbedder;
use crate::expand::QueryExpander;
use crate::keyword::KeywordScoring;
use crate::preprocess;
use crate::{DocId, Document, LoadedIndex};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// Cosine similarity over the shorter-of-the-two-lengths prefix.
/// Returns 0, never NaN, when either prefix has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let (a, b) = (&a[..len], &b[..len]);
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Case-insensitive token-overlap similarity between two raw strings.
/// 0 when either side has no tokens.
pub fn title_similarity(query: &str, title: &str) -> f32 {
    let q: HashSet<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let t: HashSet<String> = title
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if q.is_empty() || t.is_empty() {
        return 0.0;
    }
    let shared = q.intersection(&t).count();
    let union = q.union(&t).count();
    shared as f32 / union as f32
}

/// Capability seam for the semantic pass: given a query vector, score every
/// document. An approximate accelerator drops in here; the index itself never
/// depends on one.
pub trait SemanticScan: Send + Sync {
    fn score_all(&self, query: &[f32], documents: &[Document]) -> Vec<f32>;
}

/// Exhaustive cosine scan over every document.
pub struct ExactScan;

impl SemanticScan for ExactScan {
    fn score_all(&self, query: &[f32], documents: &[Document]) -> Vec<f32> {
        documents
            .iter()
            .map(|d| cosine(query, &d.content_embedding))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub semantic_weight: f32,
    pub title_weight: f32,
    pub limit: usize,
    pub threshold: f32,
    pub keyword_scoring: KeywordScoring,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            title_weight: 0.3,
            limit: 10,
            threshold: 0.0,
            keyword_scoring: KeywordScoring::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredResult {
    pub doc_id: DocId,
    pub title: String,
    pub content: String,
    /// The aggregate relevance, used for both filtering and ranking.
    pub score: f32,
    pub semantic: f32,
    pub keyword: f32,
    pub title_score: f32,
}

/// Ranks documents of a loaded index against a raw query.
///
/// The aggregate is `semantic*w + keyword*(1-w) + title*wt`. The title
/// component rides on top of the semantic/keyword split, so an aggregate can
/// exceed 1; the three weights are deliberately not normalized together.
pub struct HybridScorer<'a> {
    index: &'a LoadedIndex,
    embedder: &'a dyn TextEmbedder,
    expander: &'a QueryExpander,
    scan: Box<dyn SemanticScan>,
}

impl<'a> HybridScorer<'a> {
    pub fn new(
        index: &'a LoadedIndex,
        embedder: &'a dyn TextEmbedder,
        expander: &'a QueryExpander,
    ) -> Self {
        Self {
            index,
            embedder,
            expander,
            scan: Box::new(ExactScan),
        }
    }

    pub fn with_scan(mut self, scan: Box<dyn SemanticScan>) -> Self {
        self.scan = scan;
        self
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Vec<ScoredResult> {
        let normalized_query = preprocess::normalize(query);
        let query_embedding = self
            .embedder
            .embed(&[normalized_query.clone()])
            .await
            .into_iter()
            .next()
            .unwrap_or_default();

        // Expanded terms plus the normalized original-query terms form the
        // keyword term set.
        let expanded = self.expander.expand(query).await;
        let mut term_set = preprocess::terms(&expanded);
        term_set.extend(normalized_query.split_whitespace().map(str::to_string));
        debug!(query, expanded = %expanded, terms = term_set.len(), "query prepared");

        let documents = &self.index.documents;
        let semantic = self.scan.score_all(&query_embedding, documents);

        let raw_keyword: Vec<f32> = documents
            .iter()
            .map(|d| match options.keyword_scoring {
                KeywordScoring::Summed => self.index.keywords.score(&term_set, d.id),
                KeywordScoring::LengthNormalized => {
                    self.index.keywords.score_normalized(&term_set, d.id)
                }
            })
            .collect();
        // Per-query normalization; all zeros when nothing matched, never NaN.
        let keyword_max = raw_keyword.iter().copied().fold(0.0f32, f32::max);

        let title_boost = self.index.metadata.title_boost;
        let mut results: Vec<ScoredResult> = Vec::new();
        for (i, doc) in documents.iter().enumerate() {
            let content_sim = semantic.get(i).copied().unwrap_or(0.0);
            let title_sim = if title_boost {
                doc.title_embedding
                    .as_deref()
                    .map(|e| cosine(&query_embedding, e))
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            let title_string_sim = title_similarity(query, &doc.title);
            let normalized_keyword = if keyword_max > 0.0 {
                raw_keyword[i] / keyword_max
            } else {
                0.0
            };
            let title_component = (title_sim + title_string_sim) / 2.0;
            let aggregate = content_sim * options.semantic_weight
                + normalized_keyword * (1.0 - options.semantic_weight)
                + title_component * options.title_weight;
            if aggregate < options.threshold {
                continue;
            }
            results.push(ScoredResult {
                doc_id: doc.id,
                title: doc.title.clone(),
                content: doc.content.clone(),
                score: aggregate,
                semantic: content_sim,
                keyword: normalized_keyword,
                title_score: title_component,
            });
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.doc_id.cmp(&b.doc_id))
        });
        results.truncate(options.limit);
        results
    }
}
