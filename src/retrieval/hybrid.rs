//! Weighted reciprocal-rank fusion of keyword and vector results.

use super::embeddings::EmbeddingProvider;
use super::keyword::KeywordIndex;
use super::vector::VectorIndex;
use crate::chunker::{Chunk, ChunkId};
use crate::error::{ChunkBenchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Reciprocal-rank fusion constant.
pub const RRF_C: f64 = 60.0;

/// Default keyword share in hybrid search.
pub const DEFAULT_KEYWORD_WEIGHT: f32 = 0.6;

/// A chunk ranked by fused score, higher is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedHit {
    pub chunk: Chunk,
    pub score: f64,
    /// 1-based rank in the keyword list, if present.
    pub keyword_rank: Option<usize>,
    /// 1-based rank in the vector list, if present.
    pub vector_rank: Option<usize>,
}

fn check_weight(keyword_weight: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&keyword_weight) {
        return Err(ChunkBenchError::Config(format!(
            "keyword weight must be within [0, 1], got {}",
            keyword_weight
        )));
    }
    Ok(())
}

/// Fuse two ranked lists into at most `k` hits.
///
/// Each chunk scores `w / (c + keyword_rank) + (1 - w) / (c + vector_rank)`;
/// a list the chunk is missing from contributes nothing. Chunks scoring zero
/// are dropped, so `w = 1` yields exactly the keyword order and `w = 0`
/// exactly the vector order. Ties break by keyword rank, vector rank, then id.
pub fn fuse(
    keyword_ranked: &[Chunk],
    vector_ranked: &[Chunk],
    keyword_weight: f32,
    k: usize,
) -> Result<Vec<FusedHit>> {
    check_weight(keyword_weight)?;
    let w = f64::from(keyword_weight);

    let mut hits: HashMap<ChunkId, FusedHit> = HashMap::new();

    for (i, chunk) in keyword_ranked.iter().enumerate() {
        let rank = i + 1;
        let hit = hits.entry(chunk.id.clone()).or_insert_with(|| FusedHit {
            chunk: chunk.clone(),
            score: 0.0,
            keyword_rank: None,
            vector_rank: None,
        });
        if hit.keyword_rank.is_none() {
            hit.keyword_rank = Some(rank);
            hit.score += w / (RRF_C + rank as f64);
        }
    }

    for (i, chunk) in vector_ranked.iter().enumerate() {
        let rank = i + 1;
        let hit = hits.entry(chunk.id.clone()).or_insert_with(|| FusedHit {
            chunk: chunk.clone(),
            score: 0.0,
            keyword_rank: None,
            vector_rank: None,
        });
        if hit.vector_rank.is_none() {
            hit.vector_rank = Some(rank);
            hit.score += (1.0 - w) / (RRF_C + rank as f64);
        }
    }

    let mut fused: Vec<FusedHit> = hits.into_values().filter(|hit| hit.score > 0.0).collect();
    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| rank_key(a.keyword_rank).cmp(&rank_key(b.keyword_rank)))
            .then_with(|| rank_key(a.vector_rank).cmp(&rank_key(b.vector_rank)))
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    fused.truncate(k);

    Ok(fused)
}

fn rank_key(rank: Option<usize>) -> usize {
    rank.unwrap_or(usize::MAX)
}

/// How a hybrid retriever answers a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum SearchMode {
    /// Vector search only; scores are distances.
    Semantic,
    /// BM25 only; scores are BM25 scores.
    Keyword,
    /// Weighted reciprocal-rank fusion; scores are fused scores.
    Hybrid { keyword_weight: f32 },
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Hybrid {
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Semantic => write!(f, "semantic"),
            SearchMode::Keyword => write!(f, "keyword"),
            SearchMode::Hybrid { keyword_weight } => write!(f, "hybrid({:.2})", keyword_weight),
        }
    }
}

impl FromStr for SearchMode {
    type Err = ChunkBenchError;

    /// Parses `semantic`, `keyword` or `hybrid` (default weight).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "semantic" | "vector" => Ok(SearchMode::Semantic),
            "keyword" | "bm25" => Ok(SearchMode::Keyword),
            "hybrid" => Ok(SearchMode::default()),
            other => Err(ChunkBenchError::Config(format!(
                "unknown search mode '{}' (expected semantic, keyword or hybrid)",
                other
            ))),
        }
    }
}

/// A search hit with the score its mode produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f64,
}

/// Keyword and vector retrieval over the same chunks.
pub struct HybridRetriever<'a> {
    vector: &'a VectorIndex,
    keyword: KeywordIndex,
    provider: &'a dyn EmbeddingProvider,
}

impl<'a> HybridRetriever<'a> {
    /// Build the keyword side from the chunks stored in `vector`.
    pub fn new(vector: &'a VectorIndex, provider: &'a dyn EmbeddingProvider) -> Self {
        if provider.model_name() != vector.model {
            tracing::warn!(
                config = %vector.config_name,
                index_model = %vector.model,
                query_model = %provider.model_name(),
                "queries embedded with a different model than the index"
            );
        }
        let keyword = KeywordIndex::build(&vector.chunks());
        Self {
            vector,
            keyword,
            provider,
        }
    }

    pub async fn search(&self, query: &str, k: usize, mode: SearchMode) -> Result<Vec<SearchHit>> {
        match mode {
            SearchMode::Semantic => Ok(self
                .vector
                .query(self.provider, query, k)
                .await?
                .into_iter()
                .map(|r| SearchHit {
                    chunk: r.chunk,
                    score: f64::from(r.score),
                })
                .collect()),
            SearchMode::Keyword => Ok(self
                .keyword
                .query(query, k)
                .into_iter()
                .map(|h| SearchHit {
                    chunk: h.chunk,
                    score: h.score,
                })
                .collect()),
            SearchMode::Hybrid { keyword_weight } => {
                check_weight(keyword_weight)?;
                let keyword: Vec<Chunk> =
                    self.keyword.query(query, k).into_iter().map(|h| h.chunk).collect();
                let vector: Vec<Chunk> = self
                    .vector
                    .query(self.provider, query, k)
                    .await?
                    .into_iter()
                    .map(|r| r.chunk)
                    .collect();

                tracing::debug!(
                    query = %query,
                    keyword_hits = keyword.len(),
                    vector_hits = vector.len(),
                    keyword_weight,
                    "fusing result lists"
                );

                Ok(fuse(&keyword, &vector, keyword_weight, k)?
                    .into_iter()
                    .map(|hit| SearchHit {
                        chunk: hit.chunk,
                        score: hit.score,
                    })
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{ChunkConfig, segment_all};
    use crate::document::Document;
    use crate::retrieval::{BuildOptions, HashingEmbedder};
    use std::sync::Arc;

    fn chunks(n: usize) -> Vec<Chunk> {
        let documents: Vec<Document> = (0..n)
            .map(|i| Document::new(format!("d{}", i), format!("text number {}", i)))
            .collect();
        segment_all(&documents, &ChunkConfig::new("fuse", 100, 0)).unwrap()
    }

    fn ids(hits: &[FusedHit]) -> Vec<String> {
        hits.iter().map(|h| h.chunk.id.document_id.clone()).collect()
    }

    #[test]
    fn test_weight_one_reproduces_keyword_order() {
        let c = chunks(5);
        let keyword = vec![c[3].clone(), c[1].clone(), c[4].clone()];
        let vector = vec![c[0].clone(), c[1].clone(), c[2].clone()];

        let fused = fuse(&keyword, &vector, 1.0, 10).unwrap();
        assert_eq!(ids(&fused), vec!["d3", "d1", "d4"]);
    }

    #[test]
    fn test_weight_zero_reproduces_vector_order() {
        let c = chunks(5);
        let keyword = vec![c[3].clone(), c[1].clone(), c[4].clone()];
        let vector = vec![c[0].clone(), c[1].clone(), c[2].clone()];

        let fused = fuse(&keyword, &vector, 0.0, 10).unwrap();
        assert_eq!(ids(&fused), vec!["d0", "d1", "d2"]);
    }

    #[test]
    fn test_chunk_in_both_lists_wins() {
        let c = chunks(3);
        let keyword = vec![c[0].clone(), c[1].clone()];
        let vector = vec![c[2].clone(), c[1].clone()];

        let fused = fuse(&keyword, &vector, 0.5, 10).unwrap();
        assert_eq!(fused[0].chunk.id, c[1].id);
        assert_eq!(fused[0].keyword_rank, Some(2));
        assert_eq!(fused[0].vector_rank, Some(2));
    }

    #[test]
    fn test_output_bounded_by_k() {
        let c = chunks(6);
        let fused = fuse(&c[..3], &c[3..], 0.6, 2).unwrap();
        assert_eq!(fused.len(), 2);
        assert!(fuse(&c, &c, 0.6, 0).unwrap().is_empty());
    }

    #[test]
    fn test_equal_scores_break_by_keyword_rank() {
        let c = chunks(2);
        // Each chunk is first in exactly one list.
        let fused = fuse(&[c[1].clone()], &[c[0].clone()], 0.5, 2).unwrap();
        assert_eq!(fused[0].chunk.id, c[1].id);
        assert_eq!(fused[1].chunk.id, c[0].id);
    }

    #[test]
    fn test_weight_out_of_range_is_config_error() {
        let c = chunks(1);
        assert!(matches!(fuse(&c, &c, 1.5, 1), Err(ChunkBenchError::Config(_))));
        assert!(matches!(fuse(&c, &c, -0.1, 1), Err(ChunkBenchError::Config(_))));
    }

    #[test]
    fn test_search_mode_parsing() {
        assert_eq!("keyword".parse::<SearchMode>().unwrap(), SearchMode::Keyword);
        assert_eq!(
            "hybrid".parse::<SearchMode>().unwrap(),
            SearchMode::Hybrid { keyword_weight: 0.6 }
        );
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }

    #[tokio::test]
    async fn test_retriever_modes() {
        let documents = vec![
            Document::new("tea", "Green tea leaves are steamed to stop oxidation."),
            Document::new("coffee", "Coffee beans from Sumatra are wet-hulled."),
            Document::new("cocoa", "Cocoa pods are fermented before drying."),
        ];
        let chunks = segment_all(&documents, &ChunkConfig::new("modes", 500, 0)).unwrap();
        let provider = HashingEmbedder::new(256);
        let index = VectorIndex::build("modes", &chunks, Arc::new(provider.clone()), BuildOptions::default())
            .await
            .unwrap();
        let retriever = HybridRetriever::new(&index, &provider);

        let keyword = retriever.search("sumatra coffee", 2, SearchMode::Keyword).await.unwrap();
        assert_eq!(keyword[0].chunk.id.document_id, "coffee");

        let semantic = retriever.search("sumatra coffee", 2, SearchMode::Semantic).await.unwrap();
        assert_eq!(semantic.len(), 2);
        assert_eq!(semantic[0].chunk.id.document_id, "coffee");

        let hybrid = retriever
            .search("sumatra coffee", 2, SearchMode::default())
            .await
            .unwrap();
        assert!(hybrid.len() <= 2);
        assert_eq!(hybrid[0].chunk.id.document_id, "coffee");

        let bad = retriever
            .search("x", 2, SearchMode::Hybrid { keyword_weight: 2.0 })
            .await;
        assert!(bad.is_err());
    }
}
