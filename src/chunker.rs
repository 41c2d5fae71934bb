//! Chunk configurations and the recursive text segmenter.
//!
//! Documents are split by trying separators in priority order (paragraph,
//! line, sentence, word, character). Pieces that fit are merged greedily up
//! to `chunk_size` characters; consecutive chunks share a trailing window of
//! at most `chunk_overlap` characters.

use crate::document::Document;
use crate::error::{ChunkBenchError, Result};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;

/// Separators in priority order. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Retrieval depth used when a configuration does not set its own.
pub const DEFAULT_RETRIEVAL_K: usize = 2;

/// Configuration for text chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ChunkConfig {
    /// Unique name of the configuration.
    pub name: String,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, strictly less than `chunk_size`.
    pub chunk_overlap: usize,
    /// Number of chunks to retrieve per query for this configuration.
    #[serde(default, alias = "k")]
    pub retrieval_k: Option<usize>,
    /// Free-form description shown in reports.
    #[serde(default)]
    pub note: Option<String>,
}

impl ChunkConfig {
    pub fn new(name: impl Into<String>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            name: name.into(),
            chunk_size,
            chunk_overlap,
            retrieval_k: None,
            note: None,
        }
    }

    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = Some(k);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Retrieval depth for this configuration, falling back to `default`.
    pub fn retrieval_k_or(&self, default: usize) -> usize {
        self.retrieval_k.unwrap_or(default)
    }

    /// Check the sizing invariants. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ChunkBenchError::Config(
                "chunk config name must not be empty".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ChunkBenchError::Config(format!(
                "config '{}': chunk_size must be greater than 0",
                self.name
            )));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkBenchError::Config(format!(
                "config '{}': chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.name, self.chunk_overlap, self.chunk_size
            )));
        }
        if self.retrieval_k == Some(0) {
            return Err(ChunkBenchError::Config(format!(
                "config '{}': retrieval k must be greater than 0",
                self.name
            )));
        }
        Ok(())
    }
}

/// The three configurations compared by default: small chunks for keyword
/// search, large chunks for dense search and a middle ground.
pub fn default_configs() -> Vec<ChunkConfig> {
    vec![
        ChunkConfig::new("sparse_optimized", 300, 30).with_note("Small chunks for BM25"),
        ChunkConfig::new("dense_optimized", 800, 100).with_note("Large chunks for vector search"),
        ChunkConfig::new("hybrid_balanced", 500, 50).with_note("Compromise for hybrid search"),
    ]
}

/// Validate a set of configurations: non-empty, unique names, valid sizing.
pub fn validate_configs(configs: &[ChunkConfig]) -> Result<()> {
    if configs.is_empty() {
        return Err(ChunkBenchError::Config(
            "at least one chunk config is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for config in configs {
        config.validate()?;
        if !seen.insert(config.name.as_str()) {
            return Err(ChunkBenchError::Config(format!(
                "duplicate chunk config name '{}'",
                config.name
            )));
        }
    }
    Ok(())
}

/// Identity of a chunk: which configuration produced it, from which
/// document, and its position in that document's chunk sequence.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Encode, Decode,
)]
pub struct ChunkId {
    pub config_name: String,
    pub document_id: String,
    pub ordinal: usize,
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.config_name, self.document_id, self.ordinal)
    }
}

/// A chunk of text with positional metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Chunk {
    pub id: ChunkId,
    /// Chunk text content (trimmed).
    pub text: String,
    /// Start byte offset in the source document.
    pub start: usize,
    /// End byte offset (exclusive) in the source document.
    pub end: usize,
    /// Metadata copied from the source document.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    pub fn source_document_id(&self) -> &str {
        &self.id.document_id
    }

    pub fn config_name(&self) -> &str {
        &self.id.config_name
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Recursive character splitter for one configuration.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Create a splitter with the default separators.
    pub fn new(config: &ChunkConfig) -> Result<Self> {
        Self::with_separators(config, DEFAULT_SEPARATORS)
    }

    /// Create a splitter with custom separators, tried in order.
    pub fn with_separators(config: &ChunkConfig, separators: &[&str]) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            separators: separators.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Split text into trimmed, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut fitting: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                final_chunks.extend(self.merge_splits(&fitting));
                fitting.clear();
            }

            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    if char_len(trimmed) > self.chunk_size {
                        tracing::warn!(
                            len = char_len(trimmed),
                            chunk_size = self.chunk_size,
                            "unsplittable run exceeds chunk size"
                        );
                    }
                    final_chunks.push(trimmed.to_string());
                }
            } else {
                final_chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !fitting.is_empty() {
            final_chunks.extend(self.merge_splits(&fitting));
        }

        final_chunks
    }

    /// Greedily merge small pieces into chunks, carrying the overlap window.
    fn merge_splits(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        len = total,
                        chunk_size = self.chunk_size,
                        "created a chunk longer than the configured size"
                    );
                }
                if !window.is_empty() {
                    push_joined(&window, &mut chunks);
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0)
                    {
                        match window.pop_front() {
                            Some((_, dropped)) => total -= dropped,
                            None => break,
                        }
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        push_joined(&window, &mut chunks);
        chunks
    }
}

fn push_joined(window: &VecDeque<(&str, usize)>, chunks: &mut Vec<String>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split on `separator`, attaching each separator to the start of the piece
/// that follows it. Empty pieces are dropped.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > last {
            pieces.push(&text[last..idx]);
        }
        last = idx;
    }
    if last < text.len() {
        pieces.push(&text[last..]);
    }
    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Segment a document into chunks for one configuration.
///
/// Fails with a configuration error when the sizing is invalid. An empty
/// document produces no chunks.
pub fn segment(document: &Document, config: &ChunkConfig) -> Result<Vec<Chunk>> {
    let splitter = TextSplitter::new(config)?;
    let texts = splitter.split_text(&document.text);

    let mut chunks = Vec::with_capacity(texts.len());
    let mut previous: Option<(usize, usize)> = None;

    for (ordinal, text) in texts.into_iter().enumerate() {
        let start = locate(&document.text, &text, previous, config.chunk_overlap);
        previous = Some((start, start + text.len()));

        chunks.push(Chunk {
            id: ChunkId {
                config_name: config.name.clone(),
                document_id: document.id.clone(),
                ordinal,
            },
            end: start + text.len(),
            text,
            start,
            metadata: document.metadata.clone(),
        });
    }

    Ok(chunks)
}

/// Segment every document of a corpus, preserving corpus order.
pub fn segment_all(documents: &[Document], config: &ChunkConfig) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(segment(document, config)?);
    }
    Ok(chunks)
}

/// Byte offset of `chunk` in `text`.
///
/// A chunk starts after the previous chunk's start and no earlier than
/// `overlap` characters before the previous chunk's end.
fn locate(text: &str, chunk: &str, previous: Option<(usize, usize)>, overlap: usize) -> usize {
    let Some((prev_start, prev_end)) = previous else {
        return text.find(chunk).unwrap_or(0);
    };

    let step = text[prev_start..]
        .chars()
        .next()
        .map(char::len_utf8)
        .unwrap_or(0);
    let window_start = text[..prev_end]
        .char_indices()
        .rev()
        .take(overlap)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(prev_end);
    let cursor = (prev_start + step).max(window_start);

    text[cursor..]
        .find(chunk)
        .map(|pos| cursor + pos)
        .or_else(|| text[prev_start..].find(chunk).map(|pos| prev_start + pos))
        .unwrap_or(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prose() -> String {
        let paragraph = "Indonesia is an archipelago in Southeast Asia. It spans more than \
                         seventeen thousand islands. The capital is Jakarta. Many languages \
                         are spoken across the islands.";
        vec![paragraph; 6].join("\n\n")
    }

    #[test]
    fn test_overlap_not_smaller_than_size_fails() {
        let doc = Document::new("d", "text");
        let err = segment(&doc, &ChunkConfig::new("bad", 100, 100)).unwrap_err();
        assert!(matches!(err, ChunkBenchError::Config(_)));

        let err = segment(&doc, &ChunkConfig::new("worse", 100, 150)).unwrap_err();
        assert!(matches!(err, ChunkBenchError::Config(_)));
    }

    #[test]
    fn test_zero_size_and_zero_k_fail() {
        assert!(ChunkConfig::new("zero", 0, 0).validate().is_err());
        assert!(
            ChunkConfig::new("k", 100, 10)
                .with_retrieval_k(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_validate_configs_rejects_duplicates() {
        let configs = vec![ChunkConfig::new("a", 100, 10), ChunkConfig::new("a", 200, 20)];
        assert!(validate_configs(&configs).is_err());
        assert!(validate_configs(&[]).is_err());
        assert!(validate_configs(&default_configs()).is_ok());
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        let config = ChunkConfig::new("c", 100, 10);
        assert!(segment(&Document::new("d", ""), &config).unwrap().is_empty());
        assert!(segment(&Document::new("d", "  \n\n  "), &config).unwrap().is_empty());
    }

    #[test]
    fn test_short_document_yields_one_chunk() {
        let doc = Document::new("d", "Short text.\n\nWith two paragraphs.");
        let chunks = segment(&doc, &ChunkConfig::new("c", 500, 50)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, doc.text);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].end, doc.text.len());
    }

    #[test]
    fn test_chunks_respect_size() {
        let doc = Document::new("d", prose());
        for config in default_configs() {
            let chunks = segment(&doc, &config).unwrap();
            assert!(chunks.len() > 1, "{} produced a single chunk", config.name);
            for chunk in &chunks {
                assert!(chunk.char_len() <= config.chunk_size);
                assert_eq!(chunk.config_name(), config.name);
                assert_eq!(chunk.source_document_id(), "d");
            }
        }
    }

    #[test]
    fn test_chunks_preserve_document_order() {
        let doc = Document::new("d", prose());
        let chunks = segment(&doc, &ChunkConfig::new("c", 120, 30)).unwrap();

        for pair in chunks.windows(2) {
            assert!(pair[0].start < pair[1].start);
            assert_eq!(pair[0].id.ordinal + 1, pair[1].id.ordinal);
        }
        for chunk in &chunks {
            assert_eq!(&doc.text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let words: Vec<String> = (0..200).map(|i| format!("w{i}")).collect();
        let doc = Document::new("d", words.join(" "));
        let chunks = segment(&doc, &ChunkConfig::new("c", 60, 20)).unwrap();

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            assert!(pair[1].start < pair[0].end, "expected overlap between chunks");
        }
    }

    #[test]
    fn test_no_overlap_partitions_text() {
        let words: Vec<String> = (0..100).map(|i| format!("w{i}")).collect();
        let doc = Document::new("d", words.join(" "));
        let chunks = segment(&doc, &ChunkConfig::new("c", 50, 0)).unwrap();

        for pair in chunks.windows(2) {
            assert!(pair[1].start >= pair[0].end);
        }
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.text.split(' ')).collect();
        assert_eq!(rejoined.len(), 100);
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let doc = Document::new("d", prose());
        let config = ChunkConfig::new("c", 150, 40);
        assert_eq!(segment(&doc, &config).unwrap(), segment(&doc, &config).unwrap());
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let doc = Document::new("d", "x".repeat(250));
        let chunks = segment(&doc, &ChunkConfig::new("c", 100, 10)).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.char_len() <= 100));
        let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![0, 90, 180]);
    }

    #[test]
    fn test_multibyte_text() {
        let doc = Document::new("d", "Индонезия — островное государство. ".repeat(20));
        let chunks = segment(&doc, &ChunkConfig::new("c", 80, 10)).unwrap();
        for chunk in &chunks {
            assert!(chunk.char_len() <= 80);
            assert_eq!(&doc.text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn test_split_keeping_separator() {
        assert_eq!(
            split_keeping_separator("a\n\nb\n\n\n\nc", "\n\n"),
            vec!["a", "\n\nb", "\n\n", "\n\nc"]
        );
        assert_eq!(split_keeping_separator("ab", ""), vec!["a", "b"]);
    }

    #[test]
    fn test_chunk_id_display() {
        let id = ChunkId {
            config_name: "dense".into(),
            document_id: "doc".into(),
            ordinal: 3,
        };
        assert_eq!(id.to_string(), "dense/doc#3");
    }
}
