//! Retrieval: embeddings, vector and keyword indexes, and rank fusion.

#[cfg(feature = "local-embeddings")]
mod bert;
mod embeddings;
mod hybrid;
mod keyword;
mod vector;

#[cfg(feature = "local-embeddings")]
pub use bert::BertEmbedder;
pub use embeddings::{
    DistanceMetric, EmbeddingProvider, HashingEmbedder, OpenAiEmbedder, cosine_similarity,
    l2_normalize, provider_from_config, squared_l2,
};
pub use hybrid::{
    DEFAULT_KEYWORD_WEIGHT, FusedHit, HybridRetriever, RRF_C, SearchHit, SearchMode, fuse,
};
pub use keyword::{BM25_B, BM25_K1, KeywordHit, KeywordIndex, tokenize};
pub use vector::{BuildOptions, IndexEntry, QueryResult, VectorIndex};
