//! hybridseek: ingest plain-text documents and query them with hybrid
//! vector + keyword retrieval.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hybridseek_cli::ingest::{ingest_path, IngestOptions};
use hybridseek_core::config::{Config, Settings};
use hybridseek_embed::get_default_embedder;
use hybridseek_hybrid::{HybridSearchEngine, LocalChunkStore, SearchMode};
use hybridseek_vector::AnnOutcome;

#[derive(Parser)]
#[command(name = "hybridseek")]
#[command(about = "Hybrid vector + keyword retrieval over local text")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vector and fulltext indexes if they are missing
    Init,

    /// Chunk, embed and store a .txt file or a directory of them
    Ingest {
        path: PathBuf,

        /// Number chunks after the highest stored index
        #[arg(long)]
        append: bool,
    },

    /// Retrieve the top-k chunks for a question
    Search {
        question: String,

        #[arg(short, long)]
        k: Option<usize>,

        #[arg(long, value_enum, default_value_t = Mode::Hybrid)]
        mode: Mode,
    },

    /// Show indexes and row counts
    Status,

    /// Build the ANN index and compact the chunk table
    Optimize,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Hybrid,
    Vector,
    Keyword,
}

impl From<Mode> for SearchMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Hybrid => SearchMode::Hybrid,
            Mode::Vector => SearchMode::Vector,
            Mode::Keyword => SearchMode::Keyword,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Config::load()?.settings()?;
    let cwd = std::env::current_dir()?;
    let store = Arc::new(LocalChunkStore::from_settings(&settings, &cwd).await?);

    match cli.command {
        Commands::Init => {
            engine(&store, &settings).ensure_indexes().await?;
            println!("Indexes ready under {}", store.root().display());
        }
        Commands::Ingest { path, append } => {
            let embedder = get_default_embedder(&settings.embedding, settings.retrieval.dimensions)?;
            engine(&store, &settings).ensure_indexes().await?;
            let report = ingest_path(&store, embedder, &settings, &path, IngestOptions { append, show_progress: true }).await?;
            println!(
                "Ingested {} chunks from {} ({} written, {} unchanged)",
                report.chunks,
                path.display(),
                report.written,
                report.unchanged
            );
        }
        Commands::Search { question, k, mode } => {
            let mode = SearchMode::from(mode);
            let mut engine = engine(&store, &settings);
            if mode != SearchMode::Keyword {
                engine = engine.with_embedder(get_default_embedder(&settings.embedding, settings.retrieval.dimensions)?);
            }
            let k = k.unwrap_or(engine.default_k());
            let hits = engine.search_mode(&question, k, mode).await?;
            if hits.is_empty() {
                println!("No matching chunks.");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!("{:>2}. [chunk {}] score={:.4}", rank + 1, hit.index, hit.score);
                println!("    {}", hit.text.replace('\n', " "));
            }
        }
        Commands::Status => {
            let status = store.status().await?;
            println!("Store: {}", status.root.display());
            println!("Chunks: {}", status.rows);
            match status.dimensions {
                Some(d) => println!("Vector dimensions: {d}"),
                None => println!("Vector dimensions: (no chunk table yet)"),
            }
            if status.indexes.is_empty() {
                println!("Indexes: none (run `hybridseek init`)");
            }
            for (descriptor, docs) in &status.indexes {
                match docs {
                    Some(n) => println!("  {descriptor} docs={n}"),
                    None => println!("  {descriptor}"),
                }
            }
        }
        Commands::Optimize => {
            engine(&store, &settings).ensure_indexes().await?;
            match store.optimize(&settings.retrieval.vector_index).await? {
                AnnOutcome::Built(p) => println!("Built IVF_PQ index (nlist={}, m={}, nbits={})", p.nlist, p.m, p.nbits),
                AnnOutcome::Skipped { rows } => println!("Kept flat search: {rows} rows is below the ANN threshold"),
            }
        }
    }
    Ok(())
}

fn engine(store: &Arc<LocalChunkStore>, settings: &Settings) -> HybridSearchEngine<LocalChunkStore> {
    HybridSearchEngine::new(store.clone(), &settings.retrieval)
}
