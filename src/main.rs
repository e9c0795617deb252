//! # Vellum CLI
//!
//! The `vellum` binary is the primary interface to the ingestion and
//! retrieval pipeline.
//!
//! ## Usage
//!
//! ```bash
//! vellum --config ./config/vellum.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vellum init` | Create the data-directory layout |
//! | `vellum ingest <path>` | Ingest a file (csv, pdf, txt, json) |
//! | `vellum text "<text>"` | Ingest raw text under a label |
//! | `vellum list` | List all ingested items |
//! | `vellum search <id> "<query>"` | Similarity search against one item's index |

mod catalog;
mod chunk;
mod config;
mod embedding;
mod error;
mod index;
#[allow(dead_code)]
mod memory;
mod models;
mod reader;
#[cfg(test)]
mod testutil;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::catalog::IngestionCatalog;
use crate::embedding::DisabledProvider;
use crate::index::VectorIndexStore;
use crate::models::{ContentType, IngestedItem};

/// Vellum — a local-first document ingestion and vector retrieval engine.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/vellum.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "vellum",
    about = "Vellum — a local-first document ingestion and vector retrieval engine",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vellum.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data-directory layout (raw/, processed/, vectors/).
    ///
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Ingest a file.
    ///
    /// Copies the original bytes, extracts content by type, writes the
    /// processed record, and (for textual content) builds and persists a
    /// vector index. An embedding failure still catalogs the item, just
    /// without an index.
    Ingest {
        /// Path of the file to ingest.
        path: PathBuf,

        /// Override content-type resolution (`csv`, `pdf`, `txt`, `json`).
        /// Defaults to the file extension.
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Ingest raw text under a label.
    ///
    /// Embedding is mandatory for raw text: the ingestion fails if the
    /// index cannot be built.
    Text {
        /// The text to ingest.
        text: String,

        /// Human-readable label for the source.
        #[arg(long, default_value = "note")]
        label: String,
    },

    /// List all ingested items reconstructed from the processed records.
    List,

    /// Similarity search against one item's persisted index.
    Search {
        /// Item id (as printed by `ingest` or `list`).
        id: String,

        /// The search query.
        query: String,

        /// Number of results. Defaults to `retrieval.default_k`.
        #[arg(long)]
        k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            // Constructing the catalog creates the layout; no provider
            // needed for that.
            IngestionCatalog::new(&cfg, Arc::new(DisabledProvider), VectorIndexStore::new())?;
            println!(
                "Data directories initialized under {}",
                cfg.storage.data_dir.display()
            );
        }
        Commands::Ingest { path, content_type } => {
            let declared = match content_type {
                Some(name) => Some(ContentType::from_name(&name).ok_or_else(|| {
                    error::VellumError::UnsupportedType { requested: name }
                })?),
                None => None,
            };
            let catalog = make_catalog(&cfg)?;
            let item = catalog.ingest_file(&path, declared).await?;
            print_item(&item);
        }
        Commands::Text { text, label } => {
            let catalog = make_catalog(&cfg)?;
            let item = catalog.ingest_text(&text, &label).await?;
            print_item(&item);
        }
        Commands::List => {
            let catalog = make_catalog(&cfg)?;
            let items = catalog.list()?;
            if items.is_empty() {
                println!("No ingested items.");
                return Ok(());
            }
            println!("{} item(s)", items.len());
            for (i, item) in items.iter().enumerate() {
                let indexed = if item.vector_location.is_some() {
                    "indexed"
                } else {
                    "no index"
                };
                println!(
                    "{}. [{}] {} ({})",
                    i + 1,
                    item.content_type,
                    item.original_name,
                    indexed
                );
                println!("    id:       {}", item.id);
                println!(
                    "    ingested: {}",
                    item.ingested_at.format("%Y-%m-%dT%H:%M:%SZ")
                );
                println!();
            }
        }
        Commands::Search { id, query, k } => {
            let catalog = make_catalog(&cfg)?;
            let k = k.unwrap_or(cfg.retrieval.default_k);
            let hits = catalog.search_item(&id, &query, k).await?;
            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.4}] chunk {}",
                    i + 1,
                    hit.score,
                    hit.chunk_index
                );
                println!("    excerpt: \"{}\"", excerpt(&hit.text, 160));
                println!();
            }
        }
    }

    Ok(())
}

fn make_catalog(cfg: &config::Config) -> anyhow::Result<IngestionCatalog> {
    let provider = embedding::create_provider(&cfg.embedding)?;
    Ok(IngestionCatalog::new(
        cfg,
        provider,
        VectorIndexStore::new(),
    )?)
}

fn print_item(item: &IngestedItem) {
    println!("--- Ingested ---");
    println!("id:           {}", item.id);
    println!("name:         {}", item.original_name);
    println!("type:         {}", item.content_type);
    println!("size_bytes:   {}", item.size_bytes);
    println!(
        "ingested_at:  {}",
        item.ingested_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    println!("raw:          {}", item.raw_location.display());
    println!("processed:    {}", item.processed_location.display());
    match &item.vector_location {
        Some(dir) => println!("index:        {}", dir.display()),
        None => println!("index:        (none)"),
    }
}

/// Single-line excerpt capped at `max_chars` characters.
fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let mut out: String = flat.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
