use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tandem_core::builder::{IndexBuilder, IndexConfig};
use tandem_core::embedding::{zero_vector, TextEmbedder};
use tandem_core::error::SearchError;
use tandem_core::expand::{Disabled, NeighborProvider, QueryExpander, SynonymProvider};
use tandem_core::persist::{load_index, IndexPaths};
use tandem_core::scorer::{HybridScorer, SearchOptions};
use tempfile::tempdir;

/// Embeds everything to the same unit direction: semantic similarity is 1
/// between any two embedded texts, so rankings exercise the keyword and
/// title components.
struct ConstEmbedder {
    dim: usize,
}

#[async_trait]
impl TextEmbedder for ConstEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|_| vec![1.0; self.dim]).collect()
    }
}

/// What the HTTP client hands back when the provider fails every call.
struct ZeroEmbedder {
    dim: usize,
}

#[async_trait]
impl TextEmbedder for ZeroEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|_| zero_vector(self.dim)).collect()
    }
}

struct PetSynonyms;

#[async_trait]
impl SynonymProvider for PetSynonyms {
    async fn synonyms(&self, token: &str) -> anyhow::Result<Vec<Vec<String>>> {
        match token {
            "feline" => Ok(vec![vec!["cat".into()]]),
            "pet" => Ok(vec![vec!["companion".into()]]),
            _ => Ok(Vec::new()),
        }
    }
}

fn write_jsonl(dir: &Path, lines: &[&str]) -> PathBuf {
    let path = dir.join("records.jsonl");
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn fixture_lines() -> Vec<&'static str> {
    vec![
        r#"{"title": "Cats", "content": "Cats are small mammals"}"#,
        r#"{"title": "Dogs", "content": "Dogs are loyal companions"}"#,
        r#"{"title": "Space", "content": "Space exploration uses rockets"}"#,
    ]
}

async fn build_fixture(dir: &Path, embedder: &dyn TextEmbedder) -> PathBuf {
    let source = write_jsonl(dir, &fixture_lines());
    let index_dir = dir.join("index");
    let builder = IndexBuilder::new(embedder, IndexConfig::default());
    builder.build(&source, &index_dir).await.unwrap();
    index_dir
}

fn pet_expander() -> QueryExpander {
    QueryExpander::new(Box::new(PetSynonyms), Box::new(Disabled))
}

#[tokio::test]
async fn skipped_lines_never_consume_ids() {
    let dir = tempdir().unwrap();
    let source = write_jsonl(
        dir.path(),
        &[
            r#"{"title": "A", "content": "alpha beta"}"#,
            "",
            "   ",
            "not json at all",
            r#"{"title": "B"}"#,
            r#"{"title": "C", "content": "   "}"#,
            r#"{"title": "D", "content": "delta gamma"}"#,
        ],
    );
    let embedder = ConstEmbedder { dim: 8 };
    let builder = IndexBuilder::new(&embedder, IndexConfig::default());
    let summary = builder
        .build(&source, &dir.path().join("index"))
        .await
        .unwrap();

    assert_eq!(summary.indexed, 2);
    assert_eq!(summary.skipped_malformed, 1);
    assert_eq!(summary.skipped_missing_content, 2);

    let index = load_index(&IndexPaths::new(&summary.path)).unwrap();
    assert_eq!(index.metadata.num_docs, 2);
    let ids: Vec<u32> = index.documents.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(index.documents[1].title, "D");
    assert_eq!(index.keywords.num_docs(), 2);
}

#[tokio::test]
async fn missing_source_file_is_fatal() {
    let dir = tempdir().unwrap();
    let embedder = ConstEmbedder { dim: 8 };
    let builder = IndexBuilder::new(&embedder, IndexConfig::default());
    let err = builder
        .build(&dir.path().join("nope.jsonl"), &dir.path().join("index"))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::SourceNotFound(_)));
}

#[tokio::test]
async fn fixture_query_ranks_cats_above_space() {
    let dir = tempdir().unwrap();
    let embedder = ConstEmbedder { dim: 8 };
    let index_dir = build_fixture(dir.path(), &embedder).await;

    let index = load_index(&IndexPaths::new(&index_dir)).unwrap();
    let expander = pet_expander();
    let scorer = HybridScorer::new(&index, &embedder, &expander);
    let options = SearchOptions {
        semantic_weight: 0.7,
        title_weight: 0.3,
        threshold: 0.0,
        limit: 10,
        ..Default::default()
    };
    let results = scorer.search("feline pet", &options).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].title, "Cats");
    let cats = results.iter().position(|r| r.title == "Cats").unwrap();
    let space = results.iter().position(|r| r.title == "Space").unwrap();
    assert!(cats < space);
    for r in &results {
        assert!(r.score.is_finite());
        assert!(r.keyword <= 1.0);
    }
    // Only "Cats" and "Dogs" match expansion terms; "Space" scores zero
    // keyword but still clears the zero threshold.
    assert_eq!(results[space].keyword, 0.0);
}

#[tokio::test]
async fn total_provider_failure_degrades_to_keyword_order() {
    let dir = tempdir().unwrap();
    let build_embedder = ConstEmbedder { dim: 8 };
    let index_dir = build_fixture(dir.path(), &build_embedder).await;

    // Every embed call during the search comes back zeroed, as if the
    // provider failed each request.
    let search_embedder = ZeroEmbedder { dim: 8 };
    let index = load_index(&IndexPaths::new(&index_dir)).unwrap();
    let expander = pet_expander();
    let scorer = HybridScorer::new(&index, &search_embedder, &expander);
    let results = scorer.search("feline pet", &SearchOptions::default()).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].title, "Cats");
    for r in &results {
        assert_eq!(r.semantic, 0.0);
        assert!(r.score.is_finite());
    }
}

#[tokio::test]
async fn indexing_then_querying_exact_content_returns_it_first() {
    let dir = tempdir().unwrap();
    let source = write_jsonl(
        dir.path(),
        &[
            r#"{"title": "Ownership", "content": "ownership and borrowing rules explained"}"#,
            r#"{"title": "Space", "content": "rocket launch schedules"}"#,
        ],
    );
    let embedder = ConstEmbedder { dim: 8 };
    let builder = IndexBuilder::new(&embedder, IndexConfig::default());
    let summary = builder
        .build(&source, &dir.path().join("index"))
        .await
        .unwrap();

    let index = load_index(&IndexPaths::new(&summary.path)).unwrap();
    let expander = QueryExpander::new(Box::new(Disabled), Box::new(Disabled));
    let scorer = HybridScorer::new(&index, &embedder, &expander);
    let results = scorer
        .search(
            "ownership and borrowing rules explained",
            &SearchOptions::default(),
        )
        .await;

    assert!(!results.is_empty());
    assert_eq!(results[0].title, "Ownership");
}

#[tokio::test]
async fn no_result_scores_below_threshold() {
    let dir = tempdir().unwrap();
    let embedder = ConstEmbedder { dim: 8 };
    let index_dir = build_fixture(dir.path(), &embedder).await;

    let index = load_index(&IndexPaths::new(&index_dir)).unwrap();
    let expander = pet_expander();
    let scorer = HybridScorer::new(&index, &embedder, &expander);
    let options = SearchOptions {
        threshold: 1.0,
        ..Default::default()
    };
    let results = scorer.search("feline pet", &options).await;

    assert!(!results.is_empty());
    assert!(results.len() < 3);
    for r in &results {
        assert!(r.score >= 1.0);
    }
}

#[tokio::test]
async fn limit_truncates_after_ranking() {
    let dir = tempdir().unwrap();
    let embedder = ConstEmbedder { dim: 8 };
    let index_dir = build_fixture(dir.path(), &embedder).await;

    let index = load_index(&IndexPaths::new(&index_dir)).unwrap();
    let expander = pet_expander();
    let scorer = HybridScorer::new(&index, &embedder, &expander);
    let options = SearchOptions {
        limit: 2,
        ..Default::default()
    };
    let results = scorer.search("feline pet", &options).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Cats");
}

#[tokio::test]
async fn equal_scores_preserve_ascending_id_order() {
    let dir = tempdir().unwrap();
    let source = write_jsonl(
        dir.path(),
        &[
            r#"{"title": "Twin", "content": "identical twin record"}"#,
            r#"{"title": "Twin", "content": "identical twin record"}"#,
        ],
    );
    let embedder = ConstEmbedder { dim: 8 };
    let builder = IndexBuilder::new(&embedder, IndexConfig::default());
    let summary = builder
        .build(&source, &dir.path().join("index"))
        .await
        .unwrap();

    let index = load_index(&IndexPaths::new(&summary.path)).unwrap();
    let expander = QueryExpander::new(Box::new(Disabled), Box::new(Disabled));
    let scorer = HybridScorer::new(&index, &embedder, &expander);
    let results = scorer
        .search("identical twin record", &SearchOptions::default())
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].score, results[1].score);
    assert_eq!(results[0].doc_id, 0);
    assert_eq!(results[1].doc_id, 1);
}

#[tokio::test]
async fn missing_artifact_is_index_not_found() {
    let dir = tempdir().unwrap();
    let embedder = ConstEmbedder { dim: 8 };
    let index_dir = build_fixture(dir.path(), &embedder).await;

    fs::remove_file(index_dir.join("keywords.bin")).unwrap();
    let err = load_index(&IndexPaths::new(&index_dir)).unwrap_err();
    assert!(matches!(
        err,
        SearchError::IndexNotFound { artifact, .. } if artifact == "keywords.bin"
    ));

    let err = load_index(&IndexPaths::new(dir.path().join("never-built"))).unwrap_err();
    assert!(matches!(
        err,
        SearchError::IndexNotFound { artifact, .. } if artifact == "records.bin"
    ));
}

#[tokio::test]
async fn persisted_metadata_round_trips() {
    let dir = tempdir().unwrap();
    let embedder = ConstEmbedder { dim: 8 };
    let index_dir = build_fixture(dir.path(), &embedder).await;

    let index = load_index(&IndexPaths::new(&index_dir)).unwrap();
    assert_eq!(index.metadata.content_field, "content");
    assert_eq!(index.metadata.title_field, "title");
    assert_eq!(index.metadata.embedding_model, "minilm");
    assert_eq!(index.metadata.embedding_dimension, 8);
    assert!(index.metadata.title_boost);
    assert_eq!(index.metadata.num_docs, 3);
    assert!(!index.metadata.created_at.is_empty());

    for doc in &index.documents {
        assert_eq!(doc.content_embedding.len(), 8);
        assert!(doc.title_embedding.is_some());
        assert!(!doc.original.is_empty());
    }
}
