//! Embedding providers and vector distance functions.

use super::keyword::tokenize;
use crate::config::{EmbeddingBackend, EmbeddingConfig, LlmConfig};
use crate::error::{ChunkBenchError, Result};
use crate::llm::LlmClient;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Maps text to fixed-length vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier recorded in built indexes.
    fn model_name(&self) -> &str;

    /// Embed a batch of texts, returning one vector per text in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ChunkBenchError::Embedding("provider returned no vector".to_string()))
    }
}

/// Distance used by a vector index. Lower is always better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance.
    #[default]
    SquaredL2,
    /// `1 - cosine similarity`, in `[0, 2]`.
    Cosine,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::SquaredL2 => squared_l2(a, b),
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::SquaredL2 => "squared-l2",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Squared Euclidean distance. Mismatched lengths are infinitely far apart.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Scale a vector to unit length in place. Zero vectors are left alone.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// Needs no model or network, so it is the default provider and the one
/// used in tests. Identical texts always map to identical vectors.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
    name: String,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            dims,
            name: format!("hashing-{}", dims),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dims as u64) as usize;
            let sign = if hash >> 63 == 1 { -1.0 } else { 1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// Embeddings from an OpenAI-compatible `/v1/embeddings` endpoint.
///
/// Rate limits (429), server errors and network failures are retried with
/// exponential backoff; other client errors fail immediately.
pub struct OpenAiEmbedder {
    client: LlmClient,
    model: String,
    policy: RetryPolicy,
}

impl OpenAiEmbedder {
    pub fn new(client: LlmClient, model: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            model: model.into(),
            policy,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.policy
            .run("embeddings", || self.client.embeddings(&self.model, texts))
            .await
    }
}

/// Build the provider selected in the configuration.
pub fn provider_from_config(
    embedding: &EmbeddingConfig,
    llm: &LlmConfig,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match embedding.provider {
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(embedding.dims))),
        EmbeddingBackend::OpenAi => {
            let timeout = Duration::from_secs(embedding.timeout_secs);
            let client = LlmClient::with_timeout(llm.clone(), timeout)?;
            let policy = RetryPolicy::new(timeout, embedding.max_retries, Duration::from_secs(1));
            Ok(Arc::new(OpenAiEmbedder::new(
                client,
                embedding.model.clone(),
                policy,
            )))
        }
        #[cfg(feature = "local-embeddings")]
        EmbeddingBackend::Bert => {
            let model = super::bert::BertEmbedder::load(&embedding.model)?;
            Ok(Arc::new(model))
        }
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingBackend::Bert => Err(ChunkBenchError::Config(
            "the bert embedding provider requires building with --features local-embeddings"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[test]
    fn test_distance_metrics() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((DistanceMetric::SquaredL2.distance(&a, &b) - 2.0).abs() < 1e-6);
        assert!((DistanceMetric::Cosine.distance(&a, &b) - 1.0).abs() < 1e-6);
        assert_eq!(DistanceMetric::SquaredL2.distance(&a, &a), 0.0);
        assert!(squared_l2(&a, &[1.0]).is_infinite());
    }

    #[test]
    fn test_hashing_embedder_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_text("Jakarta is the capital of Indonesia");
        let b = embedder.embed_text("jakarta IS the capital of indonesia!");
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let empty = embedder.embed_text("");
        assert!(empty.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_hashing_embedder_similarity_tracks_overlap() {
        let embedder = HashingEmbedder::new(512);
        let query = embedder.embed_text("capital of Indonesia");
        let close = embedder.embed_text("The capital of Indonesia is Jakarta");
        let far = embedder.embed_text("Green tea should be brewed below boiling");
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_embed_via_trait() {
        let embedder = HashingEmbedder::new(32);
        let vector = tokio_test::block_on(embedder.embed("hello world")).unwrap();
        assert_eq!(vector.len(), 32);
        assert_eq!(embedder.model_name(), "hashing-32");
    }

    #[test]
    fn test_bert_without_feature_is_config_error() {
        let embedding = EmbeddingConfig {
            provider: EmbeddingBackend::Bert,
            ..Default::default()
        };
        let result = provider_from_config(&embedding, &LlmConfig::default());
        if cfg!(not(feature = "local-embeddings")) {
            assert!(matches!(result, Err(ChunkBenchError::Config(_))));
        }
    }
}
