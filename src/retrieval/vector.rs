//! Vector index over the chunks of one configuration.

use super::embeddings::{DistanceMetric, EmbeddingProvider};
use crate::chunker::Chunk;
use crate::error::{ChunkBenchError, Result};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Options for building a vector index.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Texts per embedding call.
    pub batch_size: usize,
    /// Embedding calls in flight at once.
    pub workers: usize,
    pub metric: DistanceMetric,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            batch_size: 32,
            workers: 4,
            metric: DistanceMetric::SquaredL2,
        }
    }
}

/// A vector index entry.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Embeddings of one configuration's chunks.
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct VectorIndex {
    pub config_name: String,
    pub metric: DistanceMetric,
    /// Embedding model the vectors came from.
    pub model: String,
    pub dims: usize,
    entries: Vec<IndexEntry>,
}

/// A retrieved chunk with its distance to the query (lower is better).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub chunk: Chunk,
    pub score: f32,
}

impl VectorIndex {
    /// Create an empty index. Every query against it returns nothing.
    pub fn empty(config_name: impl Into<String>, metric: DistanceMetric, model: impl Into<String>) -> Self {
        Self {
            config_name: config_name.into(),
            metric,
            model: model.into(),
            dims: 0,
            entries: Vec::new(),
        }
    }

    /// Embed `chunks` and build the index.
    ///
    /// Batches of `batch_size` texts are embedded on a pool of at most
    /// `workers` concurrent calls. Vectors land in an arena slot per chunk
    /// position, so the entry order always matches `chunks`. Any failed
    /// batch fails the whole build.
    pub async fn build(
        config_name: &str,
        chunks: &[Chunk],
        provider: Arc<dyn EmbeddingProvider>,
        options: BuildOptions,
    ) -> Result<Self> {
        let model = provider.model_name().to_string();
        if chunks.is_empty() {
            tracing::warn!(config = %config_name, "building vector index from zero chunks");
            return Ok(Self::empty(config_name, options.metric, model));
        }

        let batch_size = options.batch_size.max(1);
        let semaphore = Arc::new(Semaphore::new(options.workers.max(1)));
        let mut tasks = JoinSet::new();

        for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let provider = Arc::clone(&provider);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ChunkBenchError::Embedding(e.to_string()))?;
                let vectors = provider.embed_batch(&texts).await?;
                if vectors.len() != texts.len() {
                    return Err(ChunkBenchError::Embedding(format!(
                        "expected {} vectors, got {}",
                        texts.len(),
                        vectors.len()
                    )));
                }
                Ok::<_, ChunkBenchError>((batch_index * batch_size, vectors))
            });
        }

        let mut arena: Vec<Option<Vec<f32>>> = vec![None; chunks.len()];
        while let Some(joined) = tasks.join_next().await {
            let (offset, vectors) = joined
                .map_err(|e| ChunkBenchError::index(config_name, e.to_string()))?
                .map_err(|e| ChunkBenchError::index(config_name, e.to_string()))?;
            for (i, vector) in vectors.into_iter().enumerate() {
                arena[offset + i] = Some(vector);
            }
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, slot) in chunks.iter().zip(arena) {
            let embedding = slot.ok_or_else(|| {
                ChunkBenchError::index(config_name, format!("no embedding for chunk {}", chunk.id))
            })?;
            entries.push(IndexEntry {
                chunk: chunk.clone(),
                embedding,
            });
        }

        let dims = entries[0].embedding.len();
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dims) {
            return Err(ChunkBenchError::index(
                config_name,
                format!(
                    "embedding for chunk {} has {} dimensions, expected {}",
                    bad.chunk.id,
                    bad.embedding.len(),
                    dims
                ),
            ));
        }

        tracing::info!(
            config = %config_name,
            chunks = entries.len(),
            dims,
            metric = options.metric.as_str(),
            "built vector index"
        );

        Ok(Self {
            config_name: config_name.to_string(),
            metric: options.metric,
            model,
            dims,
            entries,
        })
    }

    /// Embed `text` with `provider` and return the `k` nearest chunks.
    pub async fn query(
        &self,
        provider: &dyn EmbeddingProvider,
        text: &str,
        k: usize,
    ) -> Result<Vec<QueryResult>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let embedding = provider.embed(text).await?;
        Ok(self.search_by_vector(&embedding, k))
    }

    /// The `k` nearest chunks to `embedding`, best first. Equal distances
    /// keep chunk order.
    pub fn search_by_vector(&self, embedding: &[f32], k: usize) -> Vec<QueryResult> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, self.metric.distance(embedding, &entry.embedding)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(position, score)| QueryResult {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect()
    }

    /// Number of chunks in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Chunks in index order.
    pub fn chunks(&self) -> Vec<Chunk> {
        self.entries.iter().map(|e| e.chunk.clone()).collect()
    }
}
