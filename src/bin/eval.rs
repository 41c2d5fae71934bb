//! Benchmark CLI: compare chunk configurations over one corpus.
//!
//! Usage:
//!   eval sample                          # Built-in sample corpus and queries
//!   eval corpus <dir> --queries <file>   # Your own corpus and query set
//!   eval configs                         # Print the configured chunkings
//!
//! Options:
//!   --mode <score-based|llm-based>   # How each query picks a winner
//!   --config <path>                  # YAML config file
//!   --top-k <N>                      # Default chunks per config per query
//!   --max-queries <N>                # Limit number of queries
//!   --verbose                        # Print every query's ranking
//!   --output <path>                  # Save results to JSON file

use anyhow::{Context, Result};
use chunk_bench::config::Config;
use chunk_bench::document::load_corpus;
use chunk_bench::eval::{
    Benchmark, BenchmarkOptions, BenchmarkResults, EvaluationMode, QuerySet, evaluator_for,
    sample_corpus, sample_queries,
};
use chunk_bench::retrieval::{BuildOptions, provider_from_config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eval")]
#[command(about = "Compare chunk configurations for retrieval", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Evaluation mode
    #[arg(long, global = true, default_value = "score-based", value_parser = parse_mode)]
    mode: EvaluationMode,

    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chunks retrieved per config when the config sets no k of its own
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Maximum number of queries to evaluate
    #[arg(long, global = true)]
    max_queries: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Save results to JSON file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run on the built-in sample corpus (for quick testing)
    Sample,

    /// Run on a directory of documents with a JSON query set
    Corpus {
        /// Directory of .txt/.md files
        path: PathBuf,

        /// Query set JSON file
        #[arg(short, long)]
        queries: PathBuf,
    },

    /// Print the chunk configurations that would be compared
    Configs,
}

fn parse_mode(s: &str) -> std::result::Result<EvaluationMode, String> {
    s.parse().map_err(|e: chunk_bench::ChunkBenchError| e.to_string())
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
    config.validate().context("Invalid configuration")?;

    if let Commands::Configs = &cli.command {
        print_configs(&config);
        return Ok(());
    }

    let (documents, queries) = match &cli.command {
        Commands::Sample => {
            println!("Using sample corpus...");
            (sample_corpus(), sample_queries())
        }
        Commands::Corpus { path, queries } => {
            println!("Loading corpus from {:?}...", path);
            let documents = load_corpus(path).context("Failed to load corpus")?;
            let queries = QuerySet::load_json(queries)?;
            (documents, queries)
        }
        Commands::Configs => return Ok(()),
    };

    println!(
        "Corpus: {} documents, query set '{}' ({} queries)",
        documents.len(),
        queries.name,
        queries.len()
    );
    println!("Mode: {}", cli.mode);

    let provider = provider_from_config(&config.embedding, &config.llm)
        .context("Failed to create embedding provider")?;
    println!("Embedding model: {}", provider.model_name());

    let evaluator = evaluator_for(cli.mode, &config).context("Failed to create evaluator")?;
    if cli.mode == EvaluationMode::LlmBased {
        println!("Judge model: {}", config.llm.model);
    }

    let options = BenchmarkOptions {
        default_k: cli.top_k.unwrap_or(config.benchmark.default_k),
        build: BuildOptions {
            batch_size: config.embedding.batch_size,
            workers: config.embedding.workers,
            metric: config.embedding.metric,
        },
        max_queries: cli.max_queries,
        verbose: cli.verbose,
    };

    let benchmark = Benchmark::new(config.benchmark.configs.clone(), evaluator, provider, options)
        .context("Invalid benchmark setup")?;
    let results: BenchmarkResults = benchmark.run(&documents, &queries).await?;

    results.print_summary();

    if let Some(output_path) = cli.output {
        let json = serde_json::to_string_pretty(&results)?;
        std::fs::write(&output_path, json)?;
        println!("Results saved to {:?}", output_path);
    }

    Ok(())
}

fn print_configs(config: &Config) {
    println!("Chunk configurations");
    println!("{}", "─".repeat(60));
    for c in &config.benchmark.configs {
        println!(
            "  {:<20} size {:>5}  overlap {:>4}  k {:>2}  {}",
            c.name,
            c.chunk_size,
            c.chunk_overlap,
            c.retrieval_k_or(config.benchmark.default_k),
            c.note.as_deref().unwrap_or("")
        );
    }
}
