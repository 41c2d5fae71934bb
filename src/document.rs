//! Corpus documents.
//!
//! A document is an immutable piece of cleaned text with an opaque metadata
//! map. Loading, cleaning and deduplication happen upstream; this module only
//! knows how to pick up plain text files from disk.

use crate::error::{ChunkBenchError, Result};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

/// File extensions picked up by [`load_corpus`].
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// A single corpus document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Document {
    /// Unique identifier within the corpus.
    pub id: String,
    /// Raw (already cleaned) text.
    pub text: String,
    /// Opaque metadata carried onto every chunk.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Create a document from raw text content.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Number of characters in the document.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Load every text file under `dir` (recursively) as a document.
///
/// Document ids are paths relative to `dir` with `/` separators, so they are
/// stable across machines. Files are returned sorted by id.
pub fn load_corpus(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(ChunkBenchError::InvalidCorpusPath(dir.to_path_buf()));
    }

    let mut documents = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            ChunkBenchError::io(path, std::io::Error::other(e.to_string()))
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let is_text = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if !is_text {
            continue;
        }

        let relative = path.strip_prefix(dir).unwrap_or(path);
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let text = std::fs::read_to_string(path).map_err(|e| ChunkBenchError::io(path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        documents.push(
            Document::new(id, text)
                .with_metadata("source", path.display().to_string())
                .with_metadata("file_name", file_name),
        );
    }

    if documents.is_empty() {
        return Err(ChunkBenchError::EmptyCorpus(dir.to_path_buf()));
    }

    documents.sort_by(|a, b| a.id.cmp(&b.id));
    tracing::debug!(count = documents.len(), dir = %dir.display(), "loaded corpus");

    Ok(documents)
}
