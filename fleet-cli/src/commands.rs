//! `fleet` subcommands.

use std::io::Write;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fleet_rag::{CacheStats, CollectionInfo, MetricsSnapshot, QueryRequest, QueryResponse};
use serde::Serialize;
use tracing::warn;

use crate::app::AppContext;
use crate::ingest::DocumentLoader;

#[derive(Parser, Debug)]
#[command(
    name = "fleet",
    version,
    about = "Answer commercial-vehicle maintenance questions from fleet records and manuals"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Load every data source into the vector store
    Init,

    /// Ask a maintenance question
    Ask {
        /// The question to answer
        question: String,

        /// Number of chunks to retrieve (defaults to 5, capped at MAX_RESULTS)
        #[arg(short, long)]
        k: Option<usize>,

        /// Do not list the cited sources
        #[arg(long)]
        no_sources: bool,

        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show collection size, embedding cache and query metrics
    Info {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run `command` against `ctx`, writing user-facing output to `out`.
pub async fn run(command: &Command, ctx: &AppContext, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Init => init(ctx, out).await,
        Command::Ask { question, k, no_sources, json } => {
            let request = QueryRequest::new(question.as_str())
                .with_k(k.unwrap_or(ctx.pipeline.config().default_k))
                .with_sources(!no_sources);
            let response = ctx.pipeline.query(&request).await;
            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
            } else {
                write!(out, "{}", render_response(&response))?;
            }
            Ok(())
        }
        Command::Info { json } => {
            let report = InfoReport {
                collection: ctx.store.get_collection_info().await?,
                cache: ctx.cache.stats(),
                metrics: ctx.metrics.snapshot(),
            };
            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            } else {
                write!(out, "{}", render_info(&report))?;
            }
            Ok(())
        }
    }
}

async fn init(ctx: &AppContext, out: &mut impl Write) -> Result<()> {
    let chunks = DocumentLoader::from_settings(&ctx.settings).load_all();
    if chunks.is_empty() {
        warn!("no documents found");
        writeln!(out, "No documents found in {}.", ctx.settings.data_dir.display())?;
        return Ok(());
    }

    ctx.store.add_documents(&chunks).await?;
    let info = ctx.store.get_collection_info().await?;
    writeln!(out, "Chunks ingested: {}", chunks.len())?;
    writeln!(out, "Collection: {}", info.name)?;
    writeln!(out, "Stored vectors: {}", info.count)?;
    writeln!(out, "Vector store: {}", ctx.settings.vector_store_dir.display())?;
    Ok(())
}

/// Everything `fleet info` reports.
#[derive(Debug, Serialize)]
pub struct InfoReport {
    pub collection: CollectionInfo,
    pub cache: CacheStats,
    pub metrics: MetricsSnapshot,
}

/// Human-readable rendering of a [`QueryResponse`].
pub fn render_response(response: &QueryResponse) -> String {
    let mut text = format!("{}\n\nConfidence: {:.2}\n", response.answer, response.confidence);
    if !response.sources.is_empty() {
        text.push_str("\nSources:\n");
        for source in &response.sources {
            let label = source.metadata.get("source").map(String::as_str).unwrap_or("Unknown");
            text.push_str(&format!(
                "[{}] {label} (similarity {:.3})\n    {}\n",
                source.rank,
                source.similarity_score,
                source.content.replace('\n', "\n    "),
            ));
        }
    }
    text
}

/// Human-readable rendering of an [`InfoReport`].
pub fn render_info(report: &InfoReport) -> String {
    let dims = report.collection.dimensions.map_or_else(|| "-".to_string(), |d| d.to_string());
    format!(
        "Collection: {}\nStored vectors: {}\nDimensions: {dims}\n\
Cached embeddings: {} ({} floats)\n\
Queries: {} ({} errors, {:.1}% error rate)\n\
Average response time: {:.2}s\n\
Cache hit rate: {:.1}%\n",
        report.collection.name,
        report.collection.count,
        report.cache.cached_embeddings,
        report.cache.total_cache_size,
        report.metrics.query_count,
        report.metrics.error_count,
        report.metrics.error_rate * 100.0,
        report.metrics.average_response_time_secs,
        report.metrics.cache_hit_rate * 100.0,
    )
}
