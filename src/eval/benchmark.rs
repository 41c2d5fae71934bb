//! Benchmark runner comparing chunk configurations over one corpus.

use super::dataset::{BenchmarkQuery, QuerySet};
use super::evaluator::{ConfigRetrieval, EvaluationMode, EvaluationRecord, Evaluator};
use super::metrics::{precision_at_k, recall_at_k};
use super::tally::{TallyRow, WinTally};
use crate::chunker::{ChunkConfig, DEFAULT_RETRIEVAL_K, segment_all, validate_configs};
use crate::document::Document;
use crate::error::{ChunkBenchError, Result};
use crate::retrieval::{BuildOptions, EmbeddingProvider, QueryResult, VectorIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Characters of the best chunk shown in verbose output.
const SNIPPET_CHARS: usize = 300;

/// Options for a benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkOptions {
    /// Retrieval depth for configs without their own `retrieval_k`.
    pub default_k: usize,
    /// Index build settings shared by all configs.
    pub build: BuildOptions,
    /// Maximum queries to evaluate (for quick testing).
    pub max_queries: Option<usize>,
    /// Print best and worst configuration per query.
    pub verbose: bool,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            default_k: DEFAULT_RETRIEVAL_K,
            build: BuildOptions::default(),
            max_queries: None,
            verbose: false,
        }
    }
}

/// One configuration's index for the duration of a run.
#[derive(Debug)]
pub struct ConfigIndex {
    pub config: ChunkConfig,
    pub chunk_count: usize,
    /// `Err` holds the build failure; the config then retrieves nothing.
    pub index: std::result::Result<VectorIndex, String>,
}

/// All indexes of a run, in declaration order.
#[derive(Debug)]
pub struct IndexSet {
    entries: Vec<ConfigIndex>,
}

impl IndexSet {
    pub fn entries(&self) -> &[ConfigIndex] {
        &self.entries
    }

    pub fn get(&self, config_name: &str) -> Option<&ConfigIndex> {
        self.entries.iter().find(|e| e.config.name == config_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether a query produced a winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryStatus {
    Scored { winner: String },
    Unscored { reason: String },
}

/// Results for a single query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query_id: String,
    pub query: String,
    pub status: QueryStatus,
    /// Best first. Empty when the evaluator failed.
    pub records: Vec<EvaluationRecord>,
}

/// Aggregated statistics for one configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigStats {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_k: usize,
    pub chunk_count: usize,
    pub index_error: Option<String>,
    pub wins: usize,
    pub win_percentage: f64,
    /// Mean of the finite aggregated scores.
    pub mean_score: Option<f64>,
    /// Mean Precision@k over queries with relevance labels.
    pub mean_precision: Option<f64>,
    /// Mean Recall@k over queries with relevance labels.
    pub mean_recall: Option<f64>,
}

/// Aggregated benchmark results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub query_set: String,
    pub mode: EvaluationMode,
    pub total_queries: usize,
    pub scored_queries: usize,
    pub unscored_queries: usize,
    /// Wins per configuration, most wins first.
    pub tally: Vec<TallyRow>,
    /// config_name -> stats.
    pub stats: BTreeMap<String, ConfigStats>,
    pub outcomes: Vec<QueryOutcome>,
    /// Total benchmark time (seconds).
    pub total_time_secs: f64,
}

impl BenchmarkResults {
    /// Print summary to stdout.
    pub fn print_summary(&self) {
        println!("\n========== Benchmark Results ==========");
        println!("Query set: {}", self.query_set);
        println!("Mode: {}", self.mode);
        println!(
            "Queries: {} ({} scored, {} unscored)",
            self.total_queries, self.scored_queries, self.unscored_queries
        );
        println!("----------------------------------------");
        for row in &self.tally {
            println!(
                "{:<20} wins: {:>3} ({:.1}%)",
                row.config_name, row.wins, row.win_percentage
            );
        }
        println!("----------------------------------------");
        for (name, stats) in &self.stats {
            let mut line = format!(
                "{:<20} size={} overlap={} k={} chunks={}",
                name, stats.chunk_size, stats.chunk_overlap, stats.retrieval_k, stats.chunk_count
            );
            if let Some(score) = stats.mean_score {
                line.push_str(&format!(" avg_score={:.4}", score));
            }
            if let (Some(p), Some(r)) = (stats.mean_precision, stats.mean_recall) {
                line.push_str(&format!(" P@k={:.2} R@k={:.2}", p, r));
            }
            if let Some(ref error) = stats.index_error {
                line.push_str(&format!(" [index failed: {}]", error));
            }
            println!("{}", line);
        }
        println!("----------------------------------------");
        println!("Total time: {:.1}s", self.total_time_secs);
        println!("========================================\n");
    }

    pub fn winners(&self) -> Vec<Option<&str>> {
        self.outcomes
            .iter()
            .map(|o| match &o.status {
                QueryStatus::Scored { winner } => Some(winner.as_str()),
                QueryStatus::Unscored { .. } => None,
            })
            .collect()
    }
}

#[derive(Default)]
struct StatsAccumulator {
    scores: Vec<f64>,
    precision: Vec<f64>,
    recall: Vec<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Benchmark runner.
pub struct Benchmark {
    configs: Vec<ChunkConfig>,
    evaluator: Arc<dyn Evaluator>,
    provider: Arc<dyn EmbeddingProvider>,
    options: BenchmarkOptions,
}

impl Benchmark {
    /// Create a runner. Fails on invalid configs before anything is built.
    pub fn new(
        configs: Vec<ChunkConfig>,
        evaluator: Arc<dyn Evaluator>,
        provider: Arc<dyn EmbeddingProvider>,
        options: BenchmarkOptions,
    ) -> Result<Self> {
        validate_configs(&configs)?;
        if options.default_k == 0 {
            return Err(ChunkBenchError::Config(
                "default retrieval k must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            configs,
            evaluator,
            provider,
            options,
        })
    }

    pub fn configs(&self) -> &[ChunkConfig] {
        &self.configs
    }

    /// Segment the corpus and build one index per config, concurrently.
    ///
    /// A config whose build fails is kept with its error and retrieves
    /// nothing for the rest of the run.
    pub async fn build_indexes(&self, documents: &[Document]) -> IndexSet {
        let documents: Arc<Vec<Document>> = Arc::new(documents.to_vec());
        let mut tasks = JoinSet::new();

        for (position, config) in self.configs.iter().enumerate() {
            let config = config.clone();
            let documents = Arc::clone(&documents);
            let provider = Arc::clone(&self.provider);
            let build = self.options.build;

            tasks.spawn(async move {
                let (chunk_count, index) = match segment_all(&documents, &config) {
                    Ok(chunks) => {
                        let count = chunks.len();
                        let index = if chunks.is_empty() {
                            Err(ChunkBenchError::index(&config.name, "no chunks produced"))
                        } else {
                            VectorIndex::build(&config.name, &chunks, provider, build).await
                        };
                        (count, index)
                    }
                    Err(e) => (0, Err(e)),
                };
                (position, config, chunk_count, index)
            });
        }

        let mut slots: Vec<Option<ConfigIndex>> = (0..self.configs.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, config, chunk_count, index)) => {
                    let index = index.map_err(|e| {
                        tracing::warn!(config = %config.name, error = %e, "index build failed");
                        e.to_string()
                    });
                    if index.is_ok() {
                        tracing::info!(
                            config = %config.name,
                            chunk_size = config.chunk_size,
                            chunk_overlap = config.chunk_overlap,
                            chunks = chunk_count,
                            "index ready"
                        );
                    }
                    slots[position] = Some(ConfigIndex {
                        config,
                        chunk_count,
                        index,
                    });
                }
                Err(e) => tracing::error!(error = %e, "index build task failed"),
            }
        }

        let entries = slots
            .into_iter()
            .zip(&self.configs)
            .map(|(slot, config)| {
                slot.unwrap_or_else(|| ConfigIndex {
                    config: config.clone(),
                    chunk_count: 0,
                    index: Err("index build task failed".to_string()),
                })
            })
            .collect();

        IndexSet { entries }
    }

    /// Top-k results of every config for one query, in declaration order.
    ///
    /// The query is embedded once and every built index is searched with
    /// that vector. If the embedding fails no config gets results.
    async fn retrieve(&self, indexes: &IndexSet, query: &str) -> Result<Vec<ConfigRetrieval>> {
        let searchable = indexes
            .entries()
            .iter()
            .any(|entry| matches!(&entry.index, Ok(index) if !index.is_empty()));

        let embedding = if searchable {
            let embedding = self.provider.embed(query).await.map_err(|e| {
                ChunkBenchError::Embedding(format!("query '{}' could not be embedded: {}", query, e))
            })?;
            Some(embedding)
        } else {
            None
        };

        let retrievals: Vec<ConfigRetrieval> = indexes
            .entries()
            .iter()
            .map(|entry| {
                let k = entry.config.retrieval_k_or(self.options.default_k);
                let results: Vec<QueryResult> = match (&entry.index, &embedding) {
                    (Ok(index), Some(embedding)) => index.search_by_vector(embedding, k),
                    _ => Vec::new(),
                };
                ConfigRetrieval {
                    config_name: entry.config.name.clone(),
                    results,
                }
            })
            .collect();

        Ok(retrievals)
    }

    /// Run every query against every config and tally the winners.
    pub async fn run(&self, documents: &[Document], queries: &QuerySet) -> Result<BenchmarkResults> {
        if queries.is_empty() {
            return Err(ChunkBenchError::Config(format!(
                "query set '{}' contains no queries",
                queries.name
            )));
        }

        let start_time = Instant::now();
        let query_set = queries.name.clone();
        let indexes = self.build_indexes(documents).await;

        let queries: Vec<&BenchmarkQuery> = match self.options.max_queries {
            Some(max) => queries.queries.iter().take(max).collect(),
            None => queries.queries.iter().collect(),
        };

        tracing::info!(
            configs = self.configs.len(),
            queries = queries.len(),
            mode = %self.evaluator.mode(),
            "running benchmark"
        );

        let mut tally = WinTally::with_configs(self.configs.iter().map(|c| c.name.clone()));
        let mut accumulators: BTreeMap<String, StatsAccumulator> = BTreeMap::new();
        let mut outcomes = Vec::with_capacity(queries.len());

        for (idx, query) in queries.iter().enumerate() {
            if self.options.verbose {
                println!("\n[{}/{}] Query: {}", idx + 1, queries.len(), query.text);
            } else {
                print!(".");
                use std::io::Write;
                std::io::stdout().flush().ok();
            }

            let retrievals = match self.retrieve(&indexes, &query.text).await {
                Ok(retrievals) => retrievals,
                Err(e) => {
                    tracing::warn!(query = %query.text, error = %e, "retrieval failed");
                    if self.options.verbose {
                        println!("  Unscored: {}", e);
                    }
                    outcomes.push(QueryOutcome {
                        query_id: query.id.clone(),
                        query: query.text.clone(),
                        status: QueryStatus::Unscored {
                            reason: e.to_string(),
                        },
                        records: Vec::new(),
                    });
                    continue;
                }
            };
            self.record_metrics(query, &retrievals, &mut accumulators);

            let (status, records) = match self.evaluator.evaluate(&query.text, &retrievals).await {
                Ok(records) => {
                    let winner = records
                        .first()
                        .filter(|r| r.is_scored())
                        .map(|r| r.config_name.clone());
                    match winner {
                        Some(winner) => {
                            tally.record(&winner);
                            (QueryStatus::Scored { winner }, records)
                        }
                        None => {
                            tracing::warn!(query = %query.text, "no configuration returned results");
                            let reason = "no configuration returned results".to_string();
                            (QueryStatus::Unscored { reason }, records)
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(query = %query.text, error = %e, "query could not be scored");
                    (
                        QueryStatus::Unscored {
                            reason: e.to_string(),
                        },
                        Vec::new(),
                    )
                }
            };

            for record in records.iter().filter(|r| r.is_scored()) {
                accumulators
                    .entry(record.config_name.clone())
                    .or_default()
                    .scores
                    .push(record.aggregated_score);
            }

            if self.options.verbose {
                print_best_and_worst(&status, &records, &retrievals);
            }

            outcomes.push(QueryOutcome {
                query_id: query.id.clone(),
                query: query.text.clone(),
                status,
                records,
            });
        }

        if !self.options.verbose {
            println!();
        }

        let scored_queries = tally.total();
        let tally_map = tally.to_map();
        let stats = indexes
            .entries()
            .iter()
            .map(|entry| {
                let name = entry.config.name.clone();
                let acc = accumulators.remove(&name).unwrap_or_default();
                let (wins, win_percentage) = tally_map
                    .get(&name)
                    .map(|s| (s.wins, s.win_percentage))
                    .unwrap_or((0, 0.0));
                let stats = ConfigStats {
                    chunk_size: entry.config.chunk_size,
                    chunk_overlap: entry.config.chunk_overlap,
                    retrieval_k: entry.config.retrieval_k_or(self.options.default_k),
                    chunk_count: entry.chunk_count,
                    index_error: entry.index.as_ref().err().cloned(),
                    wins,
                    win_percentage,
                    mean_score: mean(&acc.scores),
                    mean_precision: mean(&acc.precision),
                    mean_recall: mean(&acc.recall),
                };
                (name, stats)
            })
            .collect();

        Ok(BenchmarkResults {
            query_set,
            mode: self.evaluator.mode(),
            total_queries: outcomes.len(),
            scored_queries,
            unscored_queries: outcomes.len() - scored_queries,
            tally: tally.report(),
            stats,
            outcomes,
            total_time_secs: start_time.elapsed().as_secs_f64(),
        })
    }

    fn record_metrics(
        &self,
        query: &BenchmarkQuery,
        retrievals: &[ConfigRetrieval],
        accumulators: &mut BTreeMap<String, StatsAccumulator>,
    ) {
        if query.relevant_documents.is_empty() {
            return;
        }
        let relevant: HashSet<String> = query.relevant_documents.iter().cloned().collect();

        for (retrieval, config) in retrievals.iter().zip(&self.configs) {
            let k = config.retrieval_k_or(self.options.default_k);
            let retrieved: Vec<&str> = retrieval
                .results
                .iter()
                .map(|r| r.chunk.source_document_id())
                .collect();
            let acc = accumulators.entry(retrieval.config_name.clone()).or_default();
            acc.precision.push(precision_at_k(&retrieved, &relevant, k));
            acc.recall.push(recall_at_k(&retrieved, &relevant, k));
        }
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect::<String>().replace('\n', " ")
}

fn print_best_and_worst(
    status: &QueryStatus,
    records: &[EvaluationRecord],
    retrievals: &[ConfigRetrieval],
) {
    let top_chunk = |name: &str| {
        retrievals
            .iter()
            .find(|r| r.config_name == name)
            .and_then(|r| r.results.first())
            .map(|r| snippet(&r.chunk.text))
    };

    if let QueryStatus::Unscored { reason } = status {
        println!("  Unscored: {}", reason);
        return;
    }

    if let Some(best) = records.first() {
        println!(
            "  Best:  {} (score={:.4})",
            best.config_name, best.aggregated_score
        );
        if let Some(text) = top_chunk(&best.config_name) {
            println!("    {}...", text);
        }
    }
    if let Some(worst) = records.last() {
        println!(
            "  Worst: {} (score={:.4})",
            worst.config_name, worst.aggregated_score
        );
        if let Some(text) = top_chunk(&worst.config_name) {
            println!("    {}...", text);
        }
    }
}
