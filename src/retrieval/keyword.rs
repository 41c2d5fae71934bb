//! BM25 keyword index over the chunks of one configuration.

use crate::chunker::Chunk;
use std::collections::HashMap;

/// BM25 term-frequency saturation.
pub const BM25_K1: f64 = 1.5;
/// BM25 length normalization.
pub const BM25_B: f64 = 0.75;

/// Lowercase and split on anything that is not alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

/// A chunk matched by keyword search.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub chunk: Chunk,
    /// BM25 score, higher is better.
    pub score: f64,
}

#[derive(Debug, Clone)]
struct Posting {
    position: usize,
    term_frequency: u32,
}

/// Inverted index scored with Okapi BM25.
#[derive(Debug, Clone, Default)]
pub struct KeywordIndex {
    chunks: Vec<Chunk>,
    doc_lengths: Vec<usize>,
    avg_doc_length: f64,
    postings: HashMap<String, Vec<Posting>>,
}

impl KeywordIndex {
    pub fn build(chunks: &[Chunk]) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(chunks.len());

        for (position, chunk) in chunks.iter().enumerate() {
            let tokens = tokenize(&chunk.text);
            doc_lengths.push(tokens.len());

            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *counts.entry(token).or_insert(0) += 1;
            }
            for (term, term_frequency) in counts {
                postings.entry(term).or_default().push(Posting {
                    position,
                    term_frequency,
                });
            }
        }

        let total: usize = doc_lengths.iter().sum();
        let avg_doc_length = if chunks.is_empty() {
            0.0
        } else {
            total as f64 / chunks.len() as f64
        };

        tracing::debug!(
            chunks = chunks.len(),
            terms = postings.len(),
            "built keyword index"
        );

        Self {
            chunks: chunks.to_vec(),
            doc_lengths,
            avg_doc_length,
            postings,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn idf(&self, document_frequency: usize) -> f64 {
        let n = self.chunks.len() as f64;
        let df = document_frequency as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Top `k` chunks by BM25 score. Chunks sharing no term with the query
    /// are never returned; equal scores keep index order.
    pub fn query(&self, text: &str, k: usize) -> Vec<KeywordHit> {
        if k == 0 || self.chunks.is_empty() {
            return Vec::new();
        }

        let mut scores = vec![0.0f64; self.chunks.len()];
        let mut query_terms = tokenize(text);
        query_terms.sort();
        query_terms.dedup();

        for term in &query_terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf(postings.len());
            for posting in postings {
                let tf = f64::from(posting.term_frequency);
                let length = self.doc_lengths[posting.position] as f64;
                let norm = if self.avg_doc_length > 0.0 {
                    length / self.avg_doc_length
                } else {
                    0.0
                };
                let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm);
                scores[posting.position] += idf * tf * (BM25_K1 + 1.0) / denom;
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);

        ranked
            .into_iter()
            .map(|(position, score)| KeywordHit {
                chunk: self.chunks[position].clone(),
                score,
            })
            .collect()
    }
}
