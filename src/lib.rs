//! chunk-bench - compare chunking configurations for retrieval.
//!
//! Builds one vector index per chunk configuration over the same corpus,
//! runs a fixed query set against all of them, and ranks the configurations
//! per query either by retrieval distance or by an LLM judge. Separately,
//! fuses BM25 keyword search with vector search into one ranked list.
//!
//! # Overview
//!
//! 1. Documents are split with a recursive character splitter
//!    (paragraph, line, sentence, word, character) per [`ChunkConfig`]
//! 2. Chunks are embedded in batches on a bounded worker pool
//! 3. Each query retrieves the top-k chunks from every configuration
//! 4. An [`Evaluator`] picks the best configuration and the win is tallied
//!
//! # Quick Start
//!
//! ```no_run
//! use chunk_bench::{
//!     eval::{Benchmark, BenchmarkOptions, ScoreBasedEvaluator, sample_corpus, sample_queries},
//!     chunker::default_configs,
//!     retrieval::HashingEmbedder,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let benchmark = Benchmark::new(
//!         default_configs(),
//!         Arc::new(ScoreBasedEvaluator::new()),
//!         Arc::new(HashingEmbedder::new(256)),
//!         BenchmarkOptions::default(),
//!     )?;
//!
//!     let results = benchmark.run(&sample_corpus(), &sample_queries()).await?;
//!     results.print_summary();
//!
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! Set environment variables or create `~/.config/chunk-bench/config.yaml`:
//!
//! ```yaml
//! llm:
//!   api_base: "https://openrouter.ai/api"
//!   api_key: "your-api-key"
//!   model: "openai/gpt-4o-mini"
//! embedding:
//!   provider: hashing
//!   metric: squared-l2
//! benchmark:
//!   default_k: 2
//!   configs:
//!     - { name: small, chunk_size: 300, chunk_overlap: 30 }
//!     - { name: large, chunk_size: 800, chunk_overlap: 100 }
//! ```
//!
//! Environment variables (take precedence):
//! - `LLM_API_BASE`, `LLM_API_KEY`, `LLM_MODEL`
//! - `EMBEDDING_PROVIDER`, `EMBEDDING_MODEL`
//! - `ORACLE_TIMEOUT_SECS`, `ORACLE_MAX_RETRIES`

pub mod chunker;
pub mod config;
pub mod document;
pub mod error;
pub mod eval;
pub mod llm;
pub mod persistence;
pub mod retrieval;
pub mod retry;

pub use chunker::{Chunk, ChunkConfig, ChunkId, TextSplitter, segment};
pub use config::Config;
pub use document::Document;
pub use error::{ChunkBenchError, Result};
pub use eval::{Benchmark, BenchmarkResults, EvaluationMode, Evaluator, WinTally};
pub use retrieval::{
    EmbeddingProvider, HybridRetriever, KeywordIndex, SearchMode, VectorIndex, fuse,
};
