use crate::error::Recovered;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const DEFAULT_NEIGHBORS: usize = 3;

/// Synonym groups consulted per token.
const SYNONYM_GROUPS: usize = 3;
/// Tokens shorter than this are not worth a lookup.
const MIN_TOKEN_LEN: usize = 3;

/// Lexical-synonym collaborator. Returns synonym groups for a surface-form
/// token. Best-effort: errors are absorbed by the expander.
#[async_trait]
pub trait SynonymProvider: Send + Sync {
    async fn synonyms(&self, token: &str) -> anyhow::Result<Vec<Vec<String>>>;
}

/// Distributional word-vector collaborator. Returns the nearest neighbors of
/// a surface-form token. Best-effort, like [`SynonymProvider`].
#[async_trait]
pub trait NeighborProvider: Send + Sync {
    async fn neighbors(&self, token: &str, k: usize) -> anyhow::Result<Vec<String>>;
}

/// Provider that contributes nothing; wired when no service is configured.
pub struct Disabled;

#[async_trait]
impl SynonymProvider for Disabled {
    async fn synonyms(&self, _token: &str) -> anyhow::Result<Vec<Vec<String>>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl NeighborProvider for Disabled {
    async fn neighbors(&self, _token: &str, _k: usize) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// `GET {base}/synonyms?word=w` returning a JSON array of synonym groups.
pub struct HttpSynonymProvider {
    client: reqwest::Client,
    base: String,
}

impl HttpSynonymProvider {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into(),
        }
    }
}

#[async_trait]
impl SynonymProvider for HttpSynonymProvider {
    async fn synonyms(&self, token: &str) -> anyhow::Result<Vec<Vec<String>>> {
        let url = format!("{}/synonyms", self.base);
        let groups = self
            .client
            .get(&url)
            .query(&[("word", token)])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Vec<String>>>()
            .await?;
        Ok(groups)
    }
}

/// `GET {base}/neighbors?word=w&k=k` returning a JSON array of terms.
pub struct HttpNeighborProvider {
    client: reqwest::Client,
    base: String,
}

impl HttpNeighborProvider {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into(),
        }
    }
}

#[async_trait]
impl NeighborProvider for HttpNeighborProvider {
    async fn neighbors(&self, token: &str, k: usize) -> anyhow::Result<Vec<String>> {
        let url = format!("{}/neighbors", self.base);
        let k = k.to_string();
        let terms = self
            .client
            .get(&url)
            .query(&[("word", token), ("k", k.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<String>>()
            .await?;
        Ok(terms)
    }
}

/// Derives additional query terms from the synonym and word-vector
/// collaborators.
///
/// Expansion works on raw lowercased tokens, not normalized ones: stemming a
/// token before the synonym lookup would miss dictionary entries. The caller
/// normalizes the expanded text afterwards.
pub struct QueryExpander {
    synonyms: Box<dyn SynonymProvider>,
    neighbors: Box<dyn NeighborProvider>,
    top_k: usize,
    cache: RwLock<HashMap<String, Vec<String>>>,
}

impl QueryExpander {
    pub fn new(synonyms: Box<dyn SynonymProvider>, neighbors: Box<dyn NeighborProvider>) -> Self {
        Self {
            synonyms,
            neighbors,
            top_k: DEFAULT_NEIGHBORS,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// The original raw query followed by the space-joined set of discovered
    /// terms, deduplicated in insertion order.
    pub async fn expand(&self, raw_query: &str) -> String {
        let mut seen: HashSet<String> = HashSet::new();
        let mut extra: Vec<String> = Vec::new();
        for token in raw_query.to_lowercase().split_whitespace() {
            if token.chars().count() < MIN_TOKEN_LEN {
                continue;
            }
            let discovered = self.lookup(token).await;
            if let Some(reason) = &discovered.failure {
                debug!(token, %reason, "expansion lookup absorbed a failure");
            }
            for term in discovered.value {
                if term != token && seen.insert(term.clone()) {
                    extra.push(term);
                }
            }
        }
        if extra.is_empty() {
            raw_query.to_string()
        } else {
            format!("{} {}", raw_query, extra.join(" "))
        }
    }

    async fn lookup(&self, token: &str) -> Recovered<Vec<String>> {
        if let Some(hit) = self.cache.read().get(token) {
            return Recovered::ok(hit.clone());
        }
        let mut terms: Vec<String> = Vec::new();
        let mut failures: Vec<String> = Vec::new();

        match self.synonyms.synonyms(token).await {
            Ok(groups) => {
                for group in groups.into_iter().take(SYNONYM_GROUPS) {
                    terms.extend(group.into_iter().filter(|t| t != token));
                }
            }
            Err(err) => failures.push(format!("synonyms: {err}")),
        }
        match self.neighbors.neighbors(token, self.top_k).await {
            Ok(list) => terms.extend(list.into_iter().filter(|t| t != token)),
            Err(err) => failures.push(format!("neighbors: {err}")),
        }

        self.cache.write().insert(token.to_string(), terms.clone());
        if failures.is_empty() {
            Recovered::ok(terms)
        } else {
            Recovered::absorbed(terms, failures.join("; "))
        }
    }
}
