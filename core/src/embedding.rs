use crate::error::{Recovered, SearchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

pub const DEFAULT_MODEL: &str = "minilm";
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/v1/embeddings";

const DEFAULT_SUB_BATCH: usize = 8;
const DEFAULT_MAX_IN_FLIGHT: usize = 5;

/// One entry of the logical-name → provider-identifier registry.
#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    pub name: &'static str,
    pub provider_id: &'static str,
    pub dimension: usize,
}

const MODELS: &[ModelSpec] = &[
    ModelSpec {
        name: "minilm",
        provider_id: "sentence-transformers/all-MiniLM-L6-v2",
        dimension: 384,
    },
    ModelSpec {
        name: "mpnet",
        provider_id: "sentence-transformers/all-mpnet-base-v2",
        dimension: 768,
    },
    ModelSpec {
        name: "bge-small",
        provider_id: "BAAI/bge-small-en-v1.5",
        dimension: 384,
    },
];

/// Resolve a logical model name. An unknown name is fatal at build or search
/// start, before any document is touched.
pub fn resolve_model(name: &str) -> Result<ModelSpec, SearchError> {
    MODELS
        .iter()
        .copied()
        .find(|m| m.name == name)
        .ok_or_else(|| SearchError::ModelInitialization(name.to_string()))
}

pub fn zero_vector(dimension: usize) -> Vec<f32> {
    vec![0.0; dimension]
}

/// Converts text to fixed-dimension vectors.
///
/// `embed` returns exactly one vector per input, in input order, and never
/// fails: a text the provider could not embed comes back as a zero vector of
/// `dimension()` so that a flaky provider degrades scoring instead of
/// aborting a build or a search.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

/// HTTP client for an OpenAI-compatible `/v1/embeddings` endpoint.
///
/// Texts are dispatched in fixed sub-batches, with a bounded number of
/// requests in flight at once. Each sub-batch writes into its pre-reserved
/// output slot, so input/output order holds regardless of completion order.
/// A failing sub-batch zeroes only its own slots; siblings keep running.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: ModelSpec,
    sub_batch: usize,
    limiter: Arc<Semaphore>,
}

impl HttpEmbeddingClient {
    pub fn new(endpoint: impl Into<String>, model: ModelSpec, api_key: Option<String>) -> Self {
        if api_key.is_none() {
            warn!(
                model = model.name,
                "no embedding provider credential configured; continuing with reduced rate limits"
            );
        }
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model,
            sub_batch: DEFAULT_SUB_BATCH,
            limiter: Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT)),
        }
    }

    /// Override the per-request batch size and the in-flight request cap.
    pub fn with_limits(mut self, sub_batch: usize, max_in_flight: usize) -> Self {
        self.sub_batch = sub_batch.max(1);
        self.limiter = Arc::new(Semaphore::new(max_in_flight.max(1)));
        self
    }
}

async fn fetch_batch(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: Option<&str>,
    model_id: &str,
    batch: &[String],
) -> anyhow::Result<Vec<Vec<f32>>> {
    let mut request = client.post(endpoint).json(&EmbeddingRequest {
        model: model_id,
        input: batch,
    });
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request.send().await?.error_for_status()?;
    let body: EmbeddingResponse = response.json().await?;
    Ok(body.data.into_iter().map(|row| row.embedding).collect())
}

/// Force a provider response into one vector per requested text.
fn align_arity(rows: Vec<Vec<f32>>, expected: usize, dimension: usize) -> Recovered<Vec<Vec<f32>>> {
    if rows.len() == expected {
        return Recovered::ok(rows);
    }
    let got = rows.len();
    let mut aligned = rows;
    aligned.truncate(expected);
    while aligned.len() < expected {
        aligned.push(zero_vector(dimension));
    }
    Recovered::absorbed(
        aligned,
        format!("provider returned {got} embeddings for {expected} texts"),
    )
}

#[async_trait]
impl TextEmbedder for HttpEmbeddingClient {
    fn dimension(&self) -> usize {
        self.model.dimension
    }

    async fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts.is_empty() {
            return Vec::new();
        }
        let dimension = self.model.dimension;
        let mut handles = Vec::new();
        for (batch_idx, chunk) in texts.chunks(self.sub_batch).enumerate() {
            let client = self.client.clone();
            let endpoint = self.endpoint.clone();
            let api_key = self.api_key.clone();
            let model_id = self.model.provider_id;
            let limiter = Arc::clone(&self.limiter);
            let batch: Vec<String> = chunk.to_vec();
            let handle = tokio::spawn(async move {
                let _permit = match limiter.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(closed) => {
                        return Recovered::absorbed(
                            vec![zero_vector(dimension); batch.len()],
                            closed.to_string(),
                        )
                    }
                };
                match fetch_batch(&client, &endpoint, api_key.as_deref(), model_id, &batch).await {
                    Ok(rows) => align_arity(rows, batch.len(), dimension),
                    Err(err) => Recovered::absorbed(
                        vec![zero_vector(dimension); batch.len()],
                        err.to_string(),
                    ),
                }
            });
            handles.push((batch_idx, chunk.len(), handle));
        }

        // Slots are indexed by sub-batch; awaiting in spawn order keeps the
        // output aligned with the input no matter which request finished first.
        let batches = handles.len();
        let mut slots: Vec<Vec<Vec<f32>>> = vec![Vec::new(); batches];
        for (batch_idx, batch_len, handle) in handles {
            let recovered = match handle.await {
                Ok(recovered) => recovered,
                Err(join_err) => Recovered::absorbed(
                    vec![zero_vector(dimension); batch_len],
                    join_err.to_string(),
                ),
            };
            if let Some(reason) = &recovered.failure {
                warn!(
                    batch = batch_idx,
                    texts = batch_len,
                    %reason,
                    "embedding sub-batch absorbed a provider failure"
                );
            }
            slots[batch_idx] = recovered.value;
        }
        slots.into_iter().flatten().collect()
    }
}
