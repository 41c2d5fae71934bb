//! Evaluation of chunk configurations.
//!
//! This module provides:
//! - Score-based and LLM-as-judge evaluators behind one `Evaluator` trait
//! - The benchmark harness that builds one index per configuration
//! - Win tallies and Precision@k / Recall@k metrics
//! - Query-set loading and the built-in sample corpus

pub mod benchmark;
pub mod dataset;
pub mod evaluator;
pub mod judge;
pub mod metrics;
pub mod tally;

pub use benchmark::{
    Benchmark, BenchmarkOptions, BenchmarkResults, ConfigIndex, ConfigStats, IndexSet,
    QueryOutcome, QueryStatus,
};
pub use dataset::{BenchmarkQuery, QuerySet, sample_corpus, sample_queries};
pub use evaluator::{
    ConfigRetrieval, EvaluationMode, EvaluationRecord, Evaluator, Evidence, ScoreBasedEvaluator,
    evaluator_for,
};
pub use judge::{
    AssessmentRequest, AssessmentResponse, ChunkAssessment, JudgeEvaluator, JudgeScore, LlmJudge,
    ReasoningOracle, SubmittedChunk,
};
pub use metrics::{precision_at_k, recall_at_k};
pub use tally::{TallyRow, TallyStats, WinTally};
