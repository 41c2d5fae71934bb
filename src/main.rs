//! chunk-bench CLI
//!
//! Builds per-configuration vector indexes for a corpus and searches them
//! with semantic, keyword or hybrid retrieval.

use anyhow::{Context, Result};
use chunk_bench::{
    chunker::segment_all,
    config::Config,
    document::load_corpus,
    llm::LlmClient,
    persistence::{SaveFormat, index_exists, index_path, index_size, load_index, save_index},
    retrieval::{BuildOptions, HybridRetriever, SearchMode, VectorIndex, provider_from_config},
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// chunk-bench - chunk, index and search a corpus
#[derive(Parser)]
#[command(name = "chunk-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Semantic,
    Keyword,
    Hybrid,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one vector index per configured chunking
    Index {
        /// Directory of .txt/.md files
        corpus: PathBuf,

        /// Output directory for the index files
        #[arg(short, long, default_value = "data/indexes")]
        output: PathBuf,

        /// Write compact bincode instead of JSON
        #[arg(long)]
        binary: bool,
    },

    /// Search one index
    Search {
        /// The search query
        query: String,

        /// Path to the index file
        #[arg(short, long)]
        index: PathBuf,

        /// Number of results to return
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,

        /// Retrieval mode
        #[arg(short, long, value_enum, default_value = "hybrid")]
        mode: Mode,

        /// Keyword share of the fused score (hybrid mode)
        #[arg(long)]
        keyword_weight: Option<f32>,
    },

    /// Show information about an index
    Info {
        /// Path to the index file
        index: PathBuf,
    },

    /// Test LLM connection
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_with_file(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    match cli.command {
        Commands::Index {
            corpus,
            output,
            binary,
        } => cmd_index(config, corpus, output, binary).await,
        Commands::Search {
            query,
            index,
            top_k,
            mode,
            keyword_weight,
        } => cmd_search(config, query, index, top_k, mode, keyword_weight).await,
        Commands::Info { index } => cmd_info(index),
        Commands::Test => cmd_test(config).await,
    }
}

async fn cmd_index(config: Config, corpus: PathBuf, output: PathBuf, binary: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let documents = load_corpus(&corpus).context("Failed to load corpus")?;
    println!("Loaded {} documents from {}", documents.len(), corpus.display());

    let provider = provider_from_config(&config.embedding, &config.llm)
        .context("Failed to create embedding provider")?;
    println!("Embedding model: {}", provider.model_name());

    let options = BuildOptions {
        batch_size: config.embedding.batch_size,
        workers: config.embedding.workers,
        metric: config.embedding.metric,
    };
    let format = if binary {
        SaveFormat::Bincode
    } else {
        SaveFormat::Json
    };

    for chunk_config in &config.benchmark.configs {
        let start = Instant::now();
        let chunks = segment_all(&documents, chunk_config)
            .with_context(|| format!("Failed to chunk corpus for '{}'", chunk_config.name))?;
        let index = VectorIndex::build(&chunk_config.name, &chunks, provider.clone(), options)
            .await
            .with_context(|| format!("Failed to build index '{}'", chunk_config.name))?;

        let path = index_path(&output, &chunk_config.name, format);
        save_index(&index, &path).context("Failed to save index")?;
        let size = index_size(&path)?;

        println!(
            "  {:<20} {:>5} chunks  {:>8.1} KB  {:.2?}  -> {}",
            chunk_config.name,
            index.len(),
            size as f64 / 1024.0,
            start.elapsed(),
            path.display()
        );
    }

    Ok(())
}

async fn cmd_search(
    config: Config,
    query: String,
    index_path: PathBuf,
    top_k: usize,
    mode: Mode,
    keyword_weight: Option<f32>,
) -> Result<()> {
    if !index_exists(&index_path) {
        anyhow::bail!(
            "Index not found at '{}'. Run 'index' command first.",
            index_path.display()
        );
    }

    let index = load_index(&index_path).context("Failed to load index")?;
    let provider = provider_from_config(&config.embedding, &config.llm)
        .context("Failed to create embedding provider")?;

    let mode = match mode {
        Mode::Semantic => SearchMode::Semantic,
        Mode::Keyword => SearchMode::Keyword,
        Mode::Hybrid => SearchMode::Hybrid {
            keyword_weight: keyword_weight.unwrap_or(config.benchmark.keyword_weight),
        },
    };

    println!("Searching '{}' for: \"{}\"", index.config_name, query);
    println!("Mode: {}", mode);
    println!();

    let start = Instant::now();
    let retriever = HybridRetriever::new(&index, provider.as_ref());
    let results = retriever
        .search(&query, top_k, mode)
        .await
        .context("Search failed")?;
    let search_duration = start.elapsed();

    if results.is_empty() {
        println!("No matching chunks found.");
        return Ok(());
    }

    println!("Results:");
    println!("{}", "─".repeat(60));
    for (i, hit) in results.iter().enumerate() {
        println!("{:>2}. {} (score {:.4})", i + 1, hit.chunk.id, hit.score);
        let preview: String = hit.chunk.text.chars().take(200).collect();
        for line in preview.lines().take(3) {
            println!("      {}", line);
        }
        if hit.chunk.char_len() > 200 {
            println!("      ...");
        }
        println!();
    }
    println!("{}", "─".repeat(60));
    println!("Found {} results in {:.2?}", results.len(), search_duration);

    Ok(())
}

fn cmd_info(index_path: PathBuf) -> Result<()> {
    if !index_exists(&index_path) {
        anyhow::bail!(
            "Index not found at '{}'. Run 'index' command first.",
            index_path.display()
        );
    }

    let index = load_index(&index_path).context("Failed to load index")?;
    let size = index_size(&index_path)?;
    let documents: std::collections::BTreeSet<&str> = index
        .entries()
        .iter()
        .map(|e| e.chunk.source_document_id())
        .collect();

    println!("Vector Index Information");
    println!("{}", "─".repeat(40));
    println!("  Config:       {}", index.config_name);
    println!("  Chunks:       {}", index.len());
    println!("  Documents:    {}", documents.len());
    println!("  Model:        {}", index.model);
    println!("  Dimensions:   {}", index.dims);
    println!("  Metric:       {}", index.metric().as_str());
    println!("  File size:    {:.1} KB", size as f64 / 1024.0);
    println!("  Index path:   {}", index_path.display());

    Ok(())
}

async fn cmd_test(config: Config) -> Result<()> {
    println!("Testing LLM connection...\n");

    println!("Configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!("  Model:     {}", config.llm.model);
    let key_prefix: String = config.llm.api_key.chars().take(8).collect();
    println!("  API Key:   {}...", key_prefix);
    println!();

    if let Err(e) = config.validate_llm() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm);

    println!("Sending test request...");
    match client.test_connection().await {
        Ok(()) => println!("Connection successful!"),
        Err(e) => println!("Connection failed: {}", e),
    }

    Ok(())
}
