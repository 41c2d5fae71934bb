//! Ranking of configurations per query.
//!
//! Every evaluator turns the per-configuration retrievals for one query into
//! records ordered best first. Lower aggregated scores are better for every
//! evaluator; a configuration without results scores `+inf` and ranks last.

use super::judge::{JudgeEvaluator, LlmJudge};
use crate::config::Config;
use crate::error::{ChunkBenchError, Result};
use crate::llm::LlmClient;
use crate::retrieval::QueryResult;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// How configurations are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationMode {
    /// Mean retrieval distance.
    ScoreBased,
    /// Reasoning-oracle judgment of each configuration's top chunk.
    LlmBased,
}

impl FromStr for EvaluationMode {
    type Err = ChunkBenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "score-based" => Ok(EvaluationMode::ScoreBased),
            "llm-based" => Ok(EvaluationMode::LlmBased),
            other => Err(ChunkBenchError::Config(format!(
                "unknown evaluation mode '{}' (expected score-based or llm-based)",
                other
            ))),
        }
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationMode::ScoreBased => write!(f, "score-based"),
            EvaluationMode::LlmBased => write!(f, "llm-based"),
        }
    }
}

/// Results one configuration retrieved for a query.
#[derive(Debug, Clone)]
pub struct ConfigRetrieval {
    pub config_name: String,
    /// Best first.
    pub results: Vec<QueryResult>,
}

/// What an aggregated score was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// Retrieval distances, best first.
    Distances { distances: Vec<f32> },
    /// The oracle's verdict on the top chunk (1 best, 100 worst).
    Judgment { score: u8, reasoning: String },
    /// The configuration retrieved nothing.
    NoResults,
}

/// One configuration's result for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub config_name: String,
    /// Lower is better. `+inf` when nothing was retrieved.
    #[serde(with = "finite_or_null")]
    pub aggregated_score: f64,
    pub evidence: Evidence,
}

impl EvaluationRecord {
    pub fn no_results(config_name: impl Into<String>) -> Self {
        Self {
            config_name: config_name.into(),
            aggregated_score: f64::INFINITY,
            evidence: Evidence::NoResults,
        }
    }

    pub fn is_scored(&self) -> bool {
        self.aggregated_score.is_finite()
    }
}

/// JSON has no infinity, so `+inf` is written as `null`.
mod finite_or_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

/// Order records best first. The input must be in declaration order;
/// equal scores keep it.
pub fn rank_records(mut records: Vec<EvaluationRecord>) -> Vec<EvaluationRecord> {
    records.sort_by(|a, b| a.aggregated_score.total_cmp(&b.aggregated_score));
    records
}

/// Ranks configurations for a single query.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn mode(&self) -> EvaluationMode;

    /// Records for every configuration in `retrievals`, best first.
    ///
    /// An error means the query cannot be scored at all.
    async fn evaluate(
        &self,
        query: &str,
        retrievals: &[ConfigRetrieval],
    ) -> Result<Vec<EvaluationRecord>>;
}

/// Ranks by mean retrieval distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreBasedEvaluator;

impl ScoreBasedEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn score(retrieval: &ConfigRetrieval) -> EvaluationRecord {
        if retrieval.results.is_empty() {
            return EvaluationRecord::no_results(&retrieval.config_name);
        }
        let distances: Vec<f32> = retrieval.results.iter().map(|r| r.score).collect();
        let mean = distances.iter().map(|d| f64::from(*d)).sum::<f64>() / distances.len() as f64;
        EvaluationRecord {
            config_name: retrieval.config_name.clone(),
            aggregated_score: mean,
            evidence: Evidence::Distances { distances },
        }
    }
}

#[async_trait]
impl Evaluator for ScoreBasedEvaluator {
    fn mode(&self) -> EvaluationMode {
        EvaluationMode::ScoreBased
    }

    async fn evaluate(
        &self,
        _query: &str,
        retrievals: &[ConfigRetrieval],
    ) -> Result<Vec<EvaluationRecord>> {
        Ok(rank_records(retrievals.iter().map(Self::score).collect()))
    }
}

/// Build the evaluator for `mode` from the application config.
pub fn evaluator_for(mode: EvaluationMode, config: &Config) -> Result<Arc<dyn Evaluator>> {
    match mode {
        EvaluationMode::ScoreBased => Ok(Arc::new(ScoreBasedEvaluator::new())),
        EvaluationMode::LlmBased => {
            config.validate_llm()?;
            let policy = RetryPolicy::new(
                Duration::from_secs(config.oracle.timeout_secs),
                config.oracle.max_retries,
                Duration::from_millis(config.oracle.backoff_ms),
            );
            let judge = LlmJudge::new(LlmClient::new(config.llm.clone()));
            Ok(Arc::new(JudgeEvaluator::new(Arc::new(judge), policy)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{Chunk, ChunkId};
    use std::collections::BTreeMap;

    fn result(config: &str, ordinal: usize, text: &str, score: f32) -> QueryResult {
        QueryResult {
            chunk: Chunk {
                id: ChunkId {
                    config_name: config.to_string(),
                    document_id: "doc".to_string(),
                    ordinal,
                },
                text: text.to_string(),
                start: 0,
                end: text.len(),
                metadata: BTreeMap::new(),
            },
            score,
        }
    }

    fn retrieval(name: &str, scores: &[f32]) -> ConfigRetrieval {
        ConfigRetrieval {
            config_name: name.to_string(),
            results: scores
                .iter()
                .enumerate()
                .map(|(i, s)| result(name, i, "text", *s))
                .collect(),
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "score-based".parse::<EvaluationMode>().unwrap(),
            EvaluationMode::ScoreBased
        );
        assert_eq!(
            "llm-based".parse::<EvaluationMode>().unwrap(),
            EvaluationMode::LlmBased
        );
        assert!(matches!(
            "vibes".parse::<EvaluationMode>(),
            Err(ChunkBenchError::Config(_))
        ));
        assert_eq!(EvaluationMode::LlmBased.to_string(), "llm-based");
    }

    #[tokio::test]
    async fn test_lower_mean_distance_ranks_first() {
        let retrievals = vec![
            retrieval("a", &[0.9, 0.7]),
            retrieval("b", &[0.2, 0.4]),
            retrieval("c", &[0.5]),
        ];

        let records = ScoreBasedEvaluator.evaluate("q", &retrievals).await.unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.config_name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
        assert!((records[0].aggregated_score - 0.3).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_results_rank_last() {
        let retrievals = vec![
            retrieval("empty", &[]),
            retrieval("far", &[1000.0]),
        ];

        let records = ScoreBasedEvaluator.evaluate("q", &retrievals).await.unwrap();
        assert_eq!(records[0].config_name, "far");
        assert_eq!(records[1].config_name, "empty");
        assert!(records[1].aggregated_score.is_infinite());
        assert_eq!(records[1].evidence, Evidence::NoResults);
    }

    #[tokio::test]
    async fn test_ties_keep_declaration_order() {
        let retrievals = vec![
            retrieval("x", &[0.5]),
            retrieval("y", &[0.5]),
            retrieval("z", &[]),
            retrieval("w", &[]),
        ];

        let records = ScoreBasedEvaluator.evaluate("q", &retrievals).await.unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.config_name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z", "w"]);
    }

    #[test]
    fn test_infinite_score_serializes_as_null() {
        let record = EvaluationRecord::no_results("a");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"aggregated_score\":null"));

        let back: EvaluationRecord = serde_json::from_str(&json).unwrap();
        assert!(back.aggregated_score.is_infinite());
        assert!(!back.is_scored());
    }

    #[test]
    fn test_llm_mode_requires_credentials() {
        let config = Config::default();
        assert!(evaluator_for(EvaluationMode::ScoreBased, &config).is_ok());
        assert!(matches!(
            evaluator_for(EvaluationMode::LlmBased, &config),
            Err(ChunkBenchError::Config(_))
        ));
    }
}
