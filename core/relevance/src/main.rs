//! Inspection tool for the relevance engine
//!
//! Usage:
//!   devmem suggest --memories <memories.json> --context <file> [--language <id>] [--line <n>]
//!   devmem tags <file>
//!   devmem layout --memories <memories.json> [--cluster-strength <s>] [--seed <n>]
//!
//! Results are printed to stdout as JSON; logs go to stderr (RUST_LOG, default info).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devmem_graph::{edges, ForceLayout, LayoutConfig};
use devmem_ingestion::{InMemoryStore, TagGenerator};
use devmem_relevance::{SuggestionConfig, SuggestionOrchestrator};
use devmem_schemas::{ContextWindow, Memory, CONTEXT_RADIUS_LINES};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "devmem")]
#[command(about = "Inspect contextual suggestions, tags and graph layout for developer memories")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank memories against the code around a line of a file
    Suggest {
        /// JSON array of memories
        #[arg(long)]
        memories: PathBuf,

        /// File whose content is the context
        #[arg(long)]
        context: PathBuf,

        /// Content language of the context file
        #[arg(long)]
        language: Option<String>,

        /// Zero-based cursor line
        #[arg(long, default_value_t = 0)]
        line: usize,
    },

    /// Derive tags for a file without contacting a store
    Tags { file: PathBuf },

    /// Lay out memories as a relevance graph
    Layout {
        /// JSON array of memories
        #[arg(long)]
        memories: PathBuf,

        #[arg(long, default_value_t = 1.0)]
        cluster_strength: f32,

        /// Seed for reproducible placement
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let output = match args.command {
        Command::Suggest {
            memories,
            context,
            language,
            line,
        } => suggest(&memories, &context, language, line).await?,
        Command::Tags { file } => tags(&file)?,
        Command::Layout {
            memories,
            cluster_strength,
            seed,
        } => layout(&memories, cluster_strength, seed)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn suggest(
    memories: &Path,
    context: &Path,
    language: Option<String>,
    line: usize,
) -> Result<serde_json::Value> {
    let memories = load_memories(memories)?;
    info!("Loaded {} memories", memories.len());

    let document = std::fs::read_to_string(context)
        .with_context(|| format!("Failed to read context file {}", context.display()))?;
    let window = ContextWindow::around(
        &document,
        line,
        CONTEXT_RADIUS_LINES,
        None,
        Some(context.display().to_string()),
        language,
    );

    let store = Arc::new(InMemoryStore::new(memories));
    let (orchestrator, _presentations) =
        SuggestionOrchestrator::new(store, SuggestionConfig::from_env());

    let outcome = orchestrator.get_suggestions(&window).await;
    Ok(serde_json::to_value(outcome)?)
}

fn tags(file: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let tags = TagGenerator::new().generate(&file.display().to_string(), &content);
    Ok(json!({ "file": file.display().to_string(), "tags": tags }))
}

fn layout(memories: &Path, cluster_strength: f32, seed: Option<u64>) -> Result<serde_json::Value> {
    let memories = load_memories(memories)?;

    let layout = ForceLayout::new(LayoutConfig {
        seed,
        ..Default::default()
    });
    let nodes = layout.layout(&memories, cluster_strength);
    let edges = edges(&nodes);

    info!("Laid out {} nodes with {} edges", nodes.len(), edges.len());
    Ok(json!({ "nodes": nodes, "edges": edges }))
}

fn load_memories(path: &Path) -> Result<Vec<Memory>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read memories from {}", path.display()))?;
    let memories: Vec<Memory> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse memories in {}", path.display()))?;

    Ok(memories.into_iter().map(Memory::normalized).collect())
}
