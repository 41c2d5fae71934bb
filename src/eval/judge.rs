//! LLM-as-judge evaluation of each configuration's top chunk.
//!
//! The judge uses an inverted scale: **1 is the best score and 100 the
//! worst**, so the winning configuration is the one with the lowest score.

use super::evaluator::{
    ConfigRetrieval, EvaluationMode, EvaluationRecord, Evaluator, Evidence, rank_records,
};
use crate::error::{ChunkBenchError, Result};
use crate::llm::{LlmClient, Prompts};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Longest chunk excerpt shown to the judge, in characters.
pub const MAX_CHUNK_CHARS: usize = 500;
/// Longest accepted justification, in characters.
pub const MAX_REASONING_CHARS: usize = 1000;

/// A validated judge score in `1..=100`. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JudgeScore(u8);

impl JudgeScore {
    pub const BEST: u8 = 1;
    pub const WORST: u8 = 100;

    pub fn new(value: i64) -> Option<Self> {
        if (i64::from(Self::BEST)..=i64::from(Self::WORST)).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// True if `self` is strictly more relevant than `other`.
    pub fn beats(self, other: JudgeScore) -> bool {
        self.0 < other.0
    }
}

/// One configuration's chunk submitted for judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedChunk {
    pub config_name: String,
    pub text: String,
}

/// A request to the reasoning oracle: one query, one chunk per configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub query: String,
    pub chunks: Vec<SubmittedChunk>,
}

/// The oracle's raw verdict on one configuration. Not yet validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAssessment {
    pub config_name: String,
    pub score: i64,
    pub reasoning: String,
}

/// The oracle's raw response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentResponse {
    pub scores: Vec<ChunkAssessment>,
}

/// External judge that scores chunks for a query.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn assess(&self, request: &AssessmentRequest) -> Result<AssessmentResponse>;
}

/// Reasoning oracle backed by an OpenAI-compatible chat model.
pub struct LlmJudge {
    client: LlmClient,
}

impl LlmJudge {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn build_prompt(request: &AssessmentRequest) -> String {
        let chunks = request
            .chunks
            .iter()
            .map(|chunk| {
                format!(
                    "Configuration: {}\nFragment:\n{}",
                    chunk.config_name,
                    truncate_chars(&chunk.text, MAX_CHUNK_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        Prompts::fill(
            Prompts::chunk_assessor_user(),
            &[("{query}", request.query.as_str()), ("{chunks}", chunks.as_str())],
        )
    }

    /// Parse judge response JSON.
    fn parse_response(response: &str) -> Result<AssessmentResponse> {
        let json_str = Self::extract_json(response);
        serde_json::from_str(&json_str).map_err(|e| {
            ChunkBenchError::LlmParse(format!(
                "Failed to parse judge response: {}. Response: {}",
                e, response
            ))
        })
    }

    /// Extract JSON from response.
    fn extract_json(response: &str) -> String {
        let response = response.trim();

        if response.starts_with("```") {
            if let Some(end) = response.rfind("```") {
                let start = response.find('\n').map(|n| n + 1).unwrap_or(3);
                if end > start {
                    return response[start..end].trim().to_string();
                }
            }
        }

        if let Some(start) = response.find('{') {
            if let Some(end) = response.rfind('}') {
                if end > start {
                    return response[start..=end].to_string();
                }
            }
        }

        response.to_string()
    }
}

#[async_trait]
impl ReasoningOracle for LlmJudge {
    async fn assess(&self, request: &AssessmentRequest) -> Result<AssessmentResponse> {
        let prompt = Self::build_prompt(request);
        let response = self
            .client
            .complete(Some(Prompts::chunk_assessor_system()), &prompt)
            .await?;
        Self::parse_response(&response)
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte, _)) => format!("{}...", &text[..byte]),
        None => text.to_string(),
    }
}

/// Check that `response` scores every submitted configuration exactly once
/// with a valid score and reasoning.
pub fn validate_response(
    request: &AssessmentRequest,
    response: AssessmentResponse,
) -> std::result::Result<HashMap<String, (JudgeScore, String)>, String> {
    let mut verdicts = HashMap::new();

    for assessment in response.scores {
        if !request
            .chunks
            .iter()
            .any(|c| c.config_name == assessment.config_name)
        {
            return Err(format!("unknown configuration '{}'", assessment.config_name));
        }
        let score = JudgeScore::new(assessment.score).ok_or_else(|| {
            format!(
                "score {} for '{}' is outside 1..=100",
                assessment.score, assessment.config_name
            )
        })?;
        let length = assessment.reasoning.chars().count();
        if length > MAX_REASONING_CHARS {
            return Err(format!(
                "reasoning for '{}' is {} characters, limit is {}",
                assessment.config_name, length, MAX_REASONING_CHARS
            ));
        }
        if verdicts
            .insert(assessment.config_name.clone(), (score, assessment.reasoning))
            .is_some()
        {
            return Err(format!(
                "configuration '{}' scored more than once",
                assessment.config_name
            ));
        }
    }

    if let Some(missing) = request
        .chunks
        .iter()
        .find(|c| !verdicts.contains_key(&c.config_name))
    {
        return Err(format!("configuration '{}' was not scored", missing.config_name));
    }

    Ok(verdicts)
}

/// Ranks configurations by the oracle's score of their top chunk.
///
/// One oracle call per query. Configurations with no results are not
/// submitted and score `+inf`.
pub struct JudgeEvaluator {
    oracle: Arc<dyn ReasoningOracle>,
    policy: RetryPolicy,
}

impl JudgeEvaluator {
    pub fn new(oracle: Arc<dyn ReasoningOracle>, policy: RetryPolicy) -> Self {
        Self { oracle, policy }
    }
}

#[async_trait]
impl Evaluator for JudgeEvaluator {
    fn mode(&self) -> EvaluationMode {
        EvaluationMode::LlmBased
    }

    async fn evaluate(
        &self,
        query: &str,
        retrievals: &[ConfigRetrieval],
    ) -> Result<Vec<EvaluationRecord>> {
        let request = AssessmentRequest {
            query: query.to_string(),
            chunks: retrievals
                .iter()
                .filter_map(|r| {
                    r.results.first().map(|top| SubmittedChunk {
                        config_name: r.config_name.clone(),
                        text: top.chunk.text.clone(),
                    })
                })
                .collect(),
        };

        if request.chunks.is_empty() {
            return Ok(retrievals
                .iter()
                .map(|r| EvaluationRecord::no_results(&r.config_name))
                .collect());
        }

        let oracle_error = |message: String| ChunkBenchError::Oracle {
            query: query.to_string(),
            message,
        };

        let response = self
            .policy
            .run("judge", || self.oracle.assess(&request))
            .await
            .map_err(|e| oracle_error(e.to_string()))?;

        let mut verdicts = validate_response(&request, response).map_err(oracle_error)?;

        let records = retrievals
            .iter()
            .map(|r| match verdicts.remove(&r.config_name) {
                Some((score, reasoning)) => EvaluationRecord {
                    config_name: r.config_name.clone(),
                    aggregated_score: f64::from(score.value()),
                    evidence: Evidence::Judgment {
                        score: score.value(),
                        reasoning,
                    },
                },
                None => EvaluationRecord::no_results(&r.config_name),
            })
            .collect();

        Ok(rank_records(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{Chunk, ChunkId};
    use crate::retrieval::QueryResult;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn retrieval(name: &str, text: Option<&str>) -> ConfigRetrieval {
        ConfigRetrieval {
            config_name: name.to_string(),
            results: text
                .map(|t| {
                    vec![QueryResult {
                        chunk: Chunk {
                            id: ChunkId {
                                config_name: name.to_string(),
                                document_id: "doc".to_string(),
                                ordinal: 0,
                            },
                            text: t.to_string(),
                            start: 0,
                            end: t.len(),
                            metadata: BTreeMap::new(),
                        },
                        score: 0.5,
                    }]
                })
                .unwrap_or_default(),
        }
    }

    fn assessment(name: &str, score: i64) -> ChunkAssessment {
        ChunkAssessment {
            config_name: name.to_string(),
            score,
            reasoning: format!("{} reasoning", name),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(100), 2, Duration::from_millis(1))
    }

    /// Returns scripted responses in order, recording every request.
    struct ScriptedOracle {
        responses: Mutex<Vec<Result<AssessmentResponse>>>,
        requests: Mutex<Vec<AssessmentRequest>>,
    }

    impl ScriptedOracle {
        fn new(responses: Vec<Result<AssessmentResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReasoningOracle for ScriptedOracle {
        async fn assess(&self, request: &AssessmentRequest) -> Result<AssessmentResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ChunkBenchError::LlmParse("script exhausted".into()));
            }
            responses.remove(0)
        }
    }

    struct HangingOracle {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReasoningOracle for HangingOracle {
        async fn assess(&self, _request: &AssessmentRequest) -> Result<AssessmentResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(AssessmentResponse { scores: Vec::new() })
        }
    }

    #[tokio::test]
    async fn test_lower_judge_score_wins() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok(AssessmentResponse {
            scores: vec![assessment("a", 80), assessment("b", 5), assessment("c", 40)],
        })]));
        let evaluator = JudgeEvaluator::new(oracle, fast_policy());
        let retrievals = vec![
            retrieval("a", Some("weak")),
            retrieval("b", Some("strong")),
            retrieval("c", Some("okay")),
        ];

        let records = evaluator.evaluate("q", &retrievals).await.unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.config_name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
        assert_eq!(records[0].aggregated_score, 5.0);
        assert!(JudgeScore::new(5).unwrap().beats(JudgeScore::new(80).unwrap()));
    }

    #[tokio::test]
    async fn test_configs_without_results_are_not_submitted() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok(AssessmentResponse {
            scores: vec![assessment("b", 50)],
        })]));
        let evaluator = JudgeEvaluator::new(oracle.clone(), fast_policy());
        let retrievals = vec![retrieval("a", None), retrieval("b", Some("text"))];

        let records = evaluator.evaluate("q", &retrievals).await.unwrap();
        assert_eq!(records[0].config_name, "b");
        assert!(records[1].aggregated_score.is_infinite());

        let requests = oracle.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].chunks.len(), 1);
        assert_eq!(requests[0].chunks[0].config_name, "b");
    }

    #[tokio::test]
    async fn test_nothing_submitted_skips_oracle() {
        let oracle = Arc::new(ScriptedOracle::new(Vec::new()));
        let evaluator = JudgeEvaluator::new(oracle.clone(), fast_policy());
        let records = evaluator
            .evaluate("q", &[retrieval("a", None), retrieval("b", None)])
            .await
            .unwrap();

        assert!(records.iter().all(|r| !r.is_scored()));
        assert!(oracle.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_omitted_config_fails_query() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok(AssessmentResponse {
            scores: vec![assessment("a", 10)],
        })]));
        let evaluator = JudgeEvaluator::new(oracle, fast_policy());
        let retrievals = vec![retrieval("a", Some("x")), retrieval("b", Some("y"))];

        match evaluator.evaluate("which?", &retrievals).await {
            Err(ChunkBenchError::Oracle { query, message }) => {
                assert_eq!(query, "which?");
                assert!(message.contains("'b'"));
            }
            other => panic!("expected oracle error, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_bad_responses() {
        let request = AssessmentRequest {
            query: "q".into(),
            chunks: vec![
                SubmittedChunk {
                    config_name: "a".into(),
                    text: "x".into(),
                },
                SubmittedChunk {
                    config_name: "b".into(),
                    text: "y".into(),
                },
            ],
        };
        let check = |scores: Vec<ChunkAssessment>| {
            validate_response(&request, AssessmentResponse { scores })
        };

        assert!(check(vec![assessment("a", 1), assessment("b", 100)]).is_ok());
        assert!(check(vec![assessment("a", 0), assessment("b", 10)]).is_err());
        assert!(check(vec![assessment("a", 101), assessment("b", 10)]).is_err());
        assert!(check(vec![assessment("a", 10), assessment("a", 20)]).is_err());
        assert!(check(vec![assessment("a", 10), assessment("b", 20), assessment("c", 5)]).is_err());

        let mut long = assessment("b", 20);
        long.reasoning = "x".repeat(MAX_REASONING_CHARS + 1);
        assert!(check(vec![assessment("a", 10), long]).is_err());
    }

    #[tokio::test]
    async fn test_transient_oracle_failure_is_retried() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Err(ChunkBenchError::LlmApi {
                status: Some(429),
                message: "slow down".into(),
            }),
            Ok(AssessmentResponse {
                scores: vec![assessment("a", 30)],
            }),
        ]));
        let evaluator = JudgeEvaluator::new(oracle.clone(), fast_policy());

        let records = evaluator
            .evaluate("q", &[retrieval("a", Some("text"))])
            .await
            .unwrap();
        assert_eq!(records[0].aggregated_score, 30.0);
        assert_eq!(oracle.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_hanging_oracle_times_out() {
        let oracle = Arc::new(HangingOracle {
            calls: AtomicUsize::new(0),
        });
        let policy = RetryPolicy::new(Duration::from_millis(20), 1, Duration::from_millis(1));
        let evaluator = JudgeEvaluator::new(oracle.clone(), policy);

        let result = evaluator.evaluate("q", &[retrieval("a", Some("text"))]).await;
        assert!(matches!(result, Err(ChunkBenchError::Oracle { .. })));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_parse_fenced_response() {
        let response = "```json\n{\"scores\": [{\"config_name\": \"a\", \"score\": 12, \"reasoning\": \"direct answer\"}]}\n```";
        let parsed = LlmJudge::parse_response(response).unwrap();
        assert_eq!(parsed.scores[0].config_name, "a");
        assert_eq!(parsed.scores[0].score, 12);

        assert!(matches!(
            LlmJudge::parse_response("no json here"),
            Err(ChunkBenchError::LlmParse(_))
        ));
    }

    #[test]
    fn test_prompt_truncates_chunks() {
        let request = AssessmentRequest {
            query: "What is the capital?".into(),
            chunks: vec![SubmittedChunk {
                config_name: "big".into(),
                text: "é".repeat(MAX_CHUNK_CHARS + 50),
            }],
        };
        let prompt = LlmJudge::build_prompt(&request);
        assert!(prompt.contains("What is the capital?"));
        assert!(prompt.contains("Configuration: big"));
        assert!(prompt.contains(&format!("{}...", "é".repeat(MAX_CHUNK_CHARS))));
        assert!(!prompt.contains(&"é".repeat(MAX_CHUNK_CHARS + 1)));
    }

    #[test]
    fn test_prompt_keeps_placeholder_text_in_query() {
        let request = AssessmentRequest {
            query: "What does {chunks} mean here?".into(),
            chunks: vec![SubmittedChunk {
                config_name: "small".into(),
                text: "Jakarta is the capital.".into(),
            }],
        };
        let prompt = LlmJudge::build_prompt(&request);
        assert!(prompt.contains("User query: What does {chunks} mean here?"));
        assert_eq!(prompt.matches("Jakarta is the capital.").count(), 1);
    }
}
