use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tandem_core::builder::{IndexBuilder, IndexConfig};
use tandem_core::embedding::{
    resolve_model, HttpEmbeddingClient, DEFAULT_ENDPOINT, DEFAULT_MODEL,
};
use tandem_core::expand::{
    Disabled, HttpNeighborProvider, HttpSynonymProvider, NeighborProvider, QueryExpander,
    SynonymProvider,
};
use tandem_core::persist::{load_index, IndexPaths};
use tandem_core::preprocess;
use tandem_core::scorer::{HybridScorer, SearchOptions};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Build and query a hybrid semantic + keyword index over JSONL records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FieldArgs {
    /// Record field holding the document body
    #[arg(long, default_value = "content")]
    content_field: String,
    /// Record field holding the document title
    #[arg(long, default_value = "title")]
    title_field: String,
}

#[derive(Args)]
struct ProviderArgs {
    /// Embedding service endpoint (OpenAI-compatible)
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    embedding_url: String,
    /// Embedding provider credential
    #[arg(long, env = "TANDEM_API_KEY")]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report record statistics for a JSONL file
    Analyze {
        file: PathBuf,
        #[command(flatten)]
        fields: FieldArgs,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Build the index from a JSONL file
    Index {
        file: PathBuf,
        #[command(flatten)]
        fields: FieldArgs,
        #[command(flatten)]
        provider: ProviderArgs,
        /// Directory to write the index into
        #[arg(long, default_value = "./index")]
        index_dir: PathBuf,
        /// Logical embedding model name
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
        /// Skip title embeddings and query-time title similarity
        #[arg(long)]
        no_title_boost: bool,
    },
    /// Search the index
    Search {
        query: String,
        #[command(flatten)]
        provider: ProviderArgs,
        /// Directory holding the index
        #[arg(long, default_value = "./index")]
        index_dir: PathBuf,
        /// Override the model recorded in the index metadata
        #[arg(long)]
        model: Option<String>,
        /// Maximum results to return
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Minimum relevance for a result to be returned
        #[arg(long, default_value_t = 0.0, value_parser = parse_unit_interval)]
        threshold: f32,
        /// Weight of semantic similarity against keyword score
        #[arg(long, default_value_t = 0.7, value_parser = parse_unit_interval)]
        semantic_weight: f32,
        /// Weight of the title relevance component
        #[arg(long, default_value_t = 0.3, value_parser = parse_unit_interval)]
        title_weight: f32,
        /// Base URL of the synonym service
        #[arg(long)]
        synonyms_url: Option<String>,
        /// Base URL of the word-vector neighbor service
        #[arg(long)]
        neighbors_url: Option<String>,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn parse_unit_interval(s: &str) -> Result<f32, String> {
    let v: f32 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("{v} is outside [0, 1]"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { file, fields, json } => analyze(&file, &fields, json),
        Commands::Index {
            file,
            fields,
            provider,
            index_dir,
            model,
            no_title_boost,
        } => index(&file, fields, provider, &index_dir, model, no_title_boost).await,
        Commands::Search {
            query,
            provider,
            index_dir,
            model,
            limit,
            threshold,
            semantic_weight,
            title_weight,
            synonyms_url,
            neighbors_url,
            json,
        } => {
            search(
                &query,
                provider,
                &index_dir,
                model,
                SearchOptions {
                    semantic_weight,
                    title_weight,
                    limit,
                    threshold,
                    ..Default::default()
                },
                synonyms_url,
                neighbors_url,
                json,
            )
            .await
        }
    }
}

#[derive(Serialize)]
struct Analysis {
    lines: usize,
    blank: usize,
    malformed: usize,
    records: usize,
    with_content: usize,
    with_title: usize,
    avg_content_chars: usize,
    top_terms: Vec<(String, u32)>,
}

fn analyze(file: &PathBuf, fields: &FieldArgs, json: bool) -> Result<()> {
    let reader = BufReader::new(
        File::open(file).map_err(|e| anyhow::anyhow!("cannot open {}: {e}", file.display()))?,
    );
    let mut analysis = Analysis {
        lines: 0,
        blank: 0,
        malformed: 0,
        records: 0,
        with_content: 0,
        with_title: 0,
        avg_content_chars: 0,
        top_terms: Vec::new(),
    };
    let mut content_chars = 0usize;
    let mut term_counts: HashMap<String, u32> = HashMap::new();

    for line in reader.lines() {
        let line = line?;
        analysis.lines += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            analysis.blank += 1;
            continue;
        }
        let Ok(Value::Object(record)) = serde_json::from_str::<Value>(trimmed) else {
            analysis.malformed += 1;
            continue;
        };
        analysis.records += 1;
        if let Some(content) = record.get(&fields.content_field).and_then(Value::as_str) {
            if !content.trim().is_empty() {
                analysis.with_content += 1;
                content_chars += content.chars().count();
                for term in preprocess::normalize(content).split_whitespace() {
                    *term_counts.entry(term.to_string()).or_insert(0) += 1;
                }
            }
        }
        if record
            .get(&fields.title_field)
            .and_then(Value::as_str)
            .is_some_and(|t| !t.trim().is_empty())
        {
            analysis.with_title += 1;
        }
    }

    if analysis.with_content > 0 {
        analysis.avg_content_chars = content_chars / analysis.with_content;
    }
    let mut terms: Vec<(String, u32)> = term_counts.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    terms.truncate(10);
    analysis.top_terms = terms;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        println!("{}", file.display());
        println!(
            "  lines: {} ({} blank, {} malformed)",
            analysis.lines, analysis.blank, analysis.malformed
        );
        println!(
            "  records: {} ({} with {}, {} with {})",
            analysis.records,
            analysis.with_content,
            fields.content_field,
            analysis.with_title,
            fields.title_field
        );
        println!("  avg content length: {} chars", analysis.avg_content_chars);
        if !analysis.top_terms.is_empty() {
            let listed: Vec<String> = analysis
                .top_terms
                .iter()
                .map(|(t, n)| format!("{t} ({n})"))
                .collect();
            println!("  top terms: {}", listed.join(", "));
        }
    }
    Ok(())
}

async fn index(
    file: &PathBuf,
    fields: FieldArgs,
    provider: ProviderArgs,
    index_dir: &PathBuf,
    model: String,
    no_title_boost: bool,
) -> Result<()> {
    let spec = resolve_model(&model)?;
    let embedder = HttpEmbeddingClient::new(provider.embedding_url, spec, provider.api_key);
    let config = IndexConfig {
        content_field: fields.content_field,
        title_field: fields.title_field,
        model,
        title_boost: !no_title_boost,
        ..Default::default()
    };
    let builder = IndexBuilder::new(&embedder, config);
    let summary = builder.build(file, index_dir).await?;

    println!(
        "indexed {} documents into {}",
        summary.indexed,
        summary.path.display()
    );
    if summary.skipped_malformed + summary.skipped_missing_content > 0 {
        println!(
            "skipped {} malformed lines and {} records without content",
            summary.skipped_malformed, summary.skipped_missing_content
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn search(
    query: &str,
    provider: ProviderArgs,
    index_dir: &PathBuf,
    model: Option<String>,
    options: SearchOptions,
    synonyms_url: Option<String>,
    neighbors_url: Option<String>,
    json: bool,
) -> Result<()> {
    let index = load_index(&IndexPaths::new(index_dir))?;
    tracing::info!(
        docs = index.metadata.num_docs,
        model = %index.metadata.embedding_model,
        "index loaded"
    );
    let model_name = model.unwrap_or_else(|| index.metadata.embedding_model.clone());
    let spec = resolve_model(&model_name)?;
    let embedder = HttpEmbeddingClient::new(provider.embedding_url, spec, provider.api_key);

    let synonyms: Box<dyn SynonymProvider> = match synonyms_url {
        Some(url) => Box::new(HttpSynonymProvider::new(url)),
        None => Box::new(Disabled),
    };
    let neighbors: Box<dyn NeighborProvider> = match neighbors_url {
        Some(url) => Box::new(HttpNeighborProvider::new(url)),
        None => Box::new(Disabled),
    };
    let expander = QueryExpander::new(synonyms, neighbors);

    let scorer = HybridScorer::new(&index, &embedder, &expander);
    let results = scorer.search(query, &options).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("no results");
        return Ok(());
    }
    for r in &results {
        let label = if r.title.is_empty() {
            excerpt(&r.content)
        } else {
            r.title.clone()
        };
        println!(
            "{:>4}  {:.4}  {}  (semantic {:.3}, keyword {:.3}, title {:.3})",
            r.doc_id, r.score, label, r.semantic, r.keyword, r.title_score
        );
    }
    Ok(())
}

fn excerpt(content: &str) -> String {
    let mut s: String = content.chars().take(60).collect();
    if content.chars().count() > 60 {
        s.push('…');
    }
    s
}
