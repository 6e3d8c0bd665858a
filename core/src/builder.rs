use crate::embedding::TextEmbedder;
use crate::error::SearchError;
use crate::keyword::KeywordIndex;
use crate::persist::{self, IndexPaths};
use crate::preprocess;
use crate::{DocId, Document, IndexMetadata};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

pub const DEFAULT_CONTENT_FIELD: &str = "content";
pub const DEFAULT_TITLE_FIELD: &str = "title";
/// Documents per logical embedding batch.
pub const EMBED_BATCH: usize = 32;
/// How many times the normalized title is appended to the keyword text.
pub const TITLE_REPEAT: usize = 3;

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub content_field: String,
    pub title_field: String,
    /// Logical model name, recorded in the index metadata.
    pub model: String,
    pub title_boost: bool,
    pub batch_size: usize,
    pub title_repeat: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            content_field: DEFAULT_CONTENT_FIELD.to_string(),
            title_field: DEFAULT_TITLE_FIELD.to_string(),
            model: crate::embedding::DEFAULT_MODEL.to_string(),
            title_boost: true,
            batch_size: EMBED_BATCH,
            title_repeat: TITLE_REPEAT,
        }
    }
}

#[derive(Debug)]
pub struct IndexSummary {
    pub indexed: usize,
    pub skipped_malformed: usize,
    pub skipped_missing_content: usize,
    pub path: PathBuf,
}

/// Reads a JSONL record stream, normalizes and embeds the surviving records,
/// and persists the assembled index.
pub struct IndexBuilder<'a> {
    embedder: &'a dyn TextEmbedder,
    config: IndexConfig,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(embedder: &'a dyn TextEmbedder, config: IndexConfig) -> Self {
        Self { embedder, config }
    }

    pub async fn build(&self, source: &Path, output: &Path) -> Result<IndexSummary, SearchError> {
        if !source.is_file() {
            return Err(SearchError::SourceNotFound(source.to_path_buf()));
        }

        let (mut documents, skipped_malformed, skipped_missing) = self.read_records(source)?;
        self.embed_documents(&mut documents).await;
        let keywords = self.build_keywords(&documents);

        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let metadata = IndexMetadata {
            created_at,
            source: source.display().to_string(),
            content_field: self.config.content_field.clone(),
            title_field: self.config.title_field.clone(),
            embedding_model: self.config.model.clone(),
            embedding_dimension: self.embedder.dimension(),
            title_boost: self.config.title_boost,
            num_docs: documents.len() as u32,
        };

        let paths = IndexPaths::new(output);
        persist::save_index(&paths, &metadata, &documents, &keywords)?;
        info!(
            indexed = documents.len(),
            skipped_malformed,
            skipped_missing,
            output = %paths.root.display(),
            "index build complete"
        );
        Ok(IndexSummary {
            indexed: documents.len(),
            skipped_malformed,
            skipped_missing_content: skipped_missing,
            path: paths.root,
        })
    }

    /// One record per decodable line. A skipped line never consumes an id:
    /// ids stay dense and contiguous over the documents actually indexed.
    fn read_records(&self, source: &Path) -> Result<(Vec<Document>, usize, usize), SearchError> {
        let reader = BufReader::new(File::open(source)?);
        let mut documents: Vec<Document> = Vec::new();
        let mut skipped_malformed = 0usize;
        let mut skipped_missing = 0usize;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                debug!(line = line_no + 1, "blank line skipped");
                continue;
            }
            let fields = match serde_json::from_str::<Value>(trimmed) {
                Ok(Value::Object(fields)) => fields,
                Ok(_) => {
                    warn!(line = line_no + 1, "line is not a JSON object; skipped");
                    skipped_malformed += 1;
                    continue;
                }
                Err(err) => {
                    warn!(line = line_no + 1, error = %err, "malformed line skipped");
                    skipped_malformed += 1;
                    continue;
                }
            };
            let content = match fields
                .get(&self.config.content_field)
                .and_then(Value::as_str)
            {
                Some(s) if !s.trim().is_empty() => s.to_string(),
                _ => {
                    warn!(
                        line = line_no + 1,
                        field = %self.config.content_field,
                        "record missing content field; skipped"
                    );
                    skipped_missing += 1;
                    continue;
                }
            };
            let title = fields
                .get(&self.config.title_field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let id = documents.len() as DocId;
            documents.push(Document {
                id,
                normalized_title: preprocess::normalize(&title),
                normalized_content: preprocess::normalize(&content),
                title,
                content,
                content_embedding: Vec::new(),
                title_embedding: None,
                original: trimmed.to_string(),
            });
        }
        Ok((documents, skipped_malformed, skipped_missing))
    }

    /// Content embeddings for every document, title embeddings only when the
    /// boost is on and the normalized title is non-empty. Batches bound peak
    /// memory; the client below fans each batch out further.
    async fn embed_documents(&self, documents: &mut [Document]) {
        let batch_size = self.config.batch_size.max(1);
        let content_texts: Vec<String> = documents
            .iter()
            .map(|d| d.normalized_content.clone())
            .collect();
        for (batch_no, chunk) in content_texts.chunks(batch_size).enumerate() {
            let vectors = self.embedder.embed(chunk).await;
            for (offset, vector) in vectors.into_iter().enumerate() {
                documents[batch_no * batch_size + offset].content_embedding = vector;
            }
        }

        if !self.config.title_boost {
            return;
        }
        let titled: Vec<usize> = documents
            .iter()
            .enumerate()
            .filter(|(_, d)| !d.normalized_title.is_empty())
            .map(|(i, _)| i)
            .collect();
        for chunk in titled.chunks(batch_size) {
            let texts: Vec<String> = chunk
                .iter()
                .map(|&i| documents[i].normalized_title.clone())
                .collect();
            let vectors = self.embedder.embed(&texts).await;
            for (&i, vector) in chunk.iter().zip(vectors) {
                documents[i].title_embedding = Some(vector);
            }
        }
    }

    /// Keyword text is the normalized content with the normalized title
    /// appended `title_repeat` times, inflating title-term frequency without
    /// touching the stored title.
    fn build_keywords(&self, documents: &[Document]) -> KeywordIndex {
        let texts: Vec<String> = documents
            .iter()
            .map(|d| {
                let mut text = d.normalized_content.clone();
                if !d.normalized_title.is_empty() {
                    for _ in 0..self.config.title_repeat {
                        text.push(' ');
                        text.push_str(&d.normalized_title);
                    }
                }
                text
            })
            .collect();
        KeywordIndex::build(&texts)
    }
}
