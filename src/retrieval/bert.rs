//! Local sentence-transformers embeddings with candle.

use super::embeddings::EmbeddingProvider;
use crate::error::{ChunkBenchError, Result};
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::sync::Arc;
use tokenizers::Tokenizer;

struct BertInner {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// BERT embedder with attention-masked mean pooling and L2 normalization.
///
/// Inference is CPU-bound and runs on the blocking thread pool.
#[derive(Clone)]
pub struct BertEmbedder {
    inner: Arc<BertInner>,
    model_id: String,
}

fn embedding_error(context: &str, e: impl std::fmt::Display) -> ChunkBenchError {
    ChunkBenchError::Embedding(format!("{}: {}", context, e))
}

impl BertEmbedder {
    /// Load a sentence-transformers model from the Hugging Face Hub.
    pub fn load(model_id: &str) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().map_err(|e| embedding_error("failed to create HF Hub API", e))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| embedding_error("failed to get config.json", e))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| embedding_error("failed to get tokenizer.json", e))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| embedding_error("failed to get model.safetensors", e))?;

        let raw_config =
            std::fs::read_to_string(&config_path).map_err(|e| ChunkBenchError::io(&config_path, e))?;
        let config: BertConfig = serde_json::from_str(&raw_config)
            .map_err(|e| embedding_error("failed to parse model config", e))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| embedding_error("failed to load tokenizer", e))?;

        // SAFETY: the weights file is only read, never modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(|e| embedding_error("failed to load model weights", e))?
        };
        let model =
            BertModel::load(vb, &config).map_err(|e| embedding_error("failed to load BERT model", e))?;

        tracing::info!(model = %model_id, "loaded local embedding model");

        Ok(Self {
            inner: Arc::new(BertInner {
                model,
                tokenizer,
                device,
            }),
            model_id: model_id.to_string(),
        })
    }
}

impl BertInner {
    fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| embedding_error("tokenization failed", e))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

        let mut input_ids = Vec::with_capacity(batch_size * max_len);
        let mut attention_mask = Vec::with_capacity(batch_size * max_len);
        for encoding in &encodings {
            let mut ids = encoding.get_ids().to_vec();
            let mut mask = encoding.get_attention_mask().to_vec();
            ids.resize(max_len, 0);
            mask.resize(max_len, 0);
            input_ids.extend(ids);
            attention_mask.extend(mask);
        }
        let token_type_ids = vec![0u32; batch_size * max_len];

        self.forward(input_ids, attention_mask, token_type_ids, (batch_size, max_len))
            .map_err(|e| embedding_error("BERT forward pass failed", e))
    }

    fn forward(
        &self,
        input_ids: Vec<u32>,
        attention_mask: Vec<u32>,
        token_type_ids: Vec<u32>,
        shape: (usize, usize),
    ) -> candle_core::Result<Vec<Vec<f32>>> {
        let input_ids = Tensor::from_vec(input_ids, shape, &self.device)?;
        let attention_mask = Tensor::from_vec(attention_mask, shape, &self.device)?;
        let token_type_ids = Tensor::from_vec(token_type_ids, shape, &self.device)?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Mean over real tokens only.
        let mask = attention_mask
            .unsqueeze(2)?
            .to_dtype(output.dtype())?
            .broadcast_as(output.shape())?;
        let summed = (output * &mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        let pooled = (summed / counts)?;

        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = pooled.broadcast_div(&norms)?;

        normalized.to_vec2::<f32>()
    }
}

#[async_trait]
impl EmbeddingProvider for BertEmbedder {
    fn model_name(&self) -> &str {
        &self.model_id
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || inner.embed_blocking(texts))
            .await
            .map_err(|e| embedding_error("embedding task failed", e))?
    }
}
