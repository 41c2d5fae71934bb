//! Persistence layer for saving/loading vector indexes.
//!
//! Supports both JSON (human-readable) and bincode (efficient binary) formats.

use crate::error::{ChunkBenchError, Result};
use crate::retrieval::VectorIndex;
use std::fs;
use std::path::{Path, PathBuf};

/// Save format for vector indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    /// JSON format (human-readable, larger).
    Json,
    /// Bincode format (binary, compact).
    Bincode,
}

impl SaveFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Json => "json",
            SaveFormat::Bincode => "bin",
        }
    }
}

/// File name used for a config's index inside an output directory.
pub fn index_path(dir: &Path, config_name: &str, format: SaveFormat) -> PathBuf {
    dir.join(format!("{}.{}", config_name, format.extension()))
}

/// Save a VectorIndex to a file.
pub fn save_index(index: &VectorIndex, path: &Path) -> Result<()> {
    save_index_with_format(index, path, SaveFormat::from_path(path))
}

/// Save a VectorIndex with specific format.
pub fn save_index_with_format(index: &VectorIndex, path: &Path, format: SaveFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| ChunkBenchError::io(parent, e))?;
        }
    }

    let data = match format {
        SaveFormat::Json => serde_json::to_string_pretty(index)
            .map_err(|e| ChunkBenchError::Serialization(e.to_string()))?
            .into_bytes(),
        SaveFormat::Bincode => bincode::encode_to_vec(index, bincode::config::standard())
            .map_err(|e| ChunkBenchError::Serialization(e.to_string()))?,
    };

    fs::write(path, &data).map_err(|e| ChunkBenchError::io(path, e))?;

    tracing::debug!(
        config = %index.config_name,
        path = %path.display(),
        bytes = data.len(),
        "saved index"
    );
    Ok(())
}

/// Load a VectorIndex from a file.
pub fn load_index(path: &Path) -> Result<VectorIndex> {
    if !path.exists() {
        return Err(ChunkBenchError::IndexNotFound(path.to_path_buf()));
    }
    load_index_with_format(path, SaveFormat::from_path(path))
}

/// Load a VectorIndex with specific format.
pub fn load_index_with_format(path: &Path, format: SaveFormat) -> Result<VectorIndex> {
    let data = fs::read(path).map_err(|e| ChunkBenchError::io(path, e))?;

    let index = match format {
        SaveFormat::Json => serde_json::from_slice(&data)
            .map_err(|e| ChunkBenchError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => {
            let (index, _): (VectorIndex, usize) =
                bincode::decode_from_slice(&data, bincode::config::standard())
                    .map_err(|e| ChunkBenchError::Serialization(e.to_string()))?;
            index
        }
    };

    Ok(index)
}

/// Check if an index file exists at the given path.
pub fn index_exists(path: &Path) -> bool {
    path.is_file()
}

/// Get the size of an index file in bytes.
pub fn index_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| ChunkBenchError::io(path, e))?;
    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{ChunkConfig, segment_all};
    use crate::document::Document;
    use crate::retrieval::{BuildOptions, DistanceMetric, HashingEmbedder};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn create_test_index() -> VectorIndex {
        let documents = vec![
            Document::new("a", "Mount Bromo is an active volcano in East Java.")
                .with_metadata("source", "a.txt"),
            Document::new("b", "Lake Toba fills a supervolcano caldera in Sumatra."),
        ];
        let chunks = segment_all(&documents, &ChunkConfig::new("persist", 200, 20)).unwrap();
        let options = BuildOptions {
            metric: DistanceMetric::Cosine,
            ..Default::default()
        };
        VectorIndex::build("persist", &chunks, Arc::new(HashingEmbedder::new(32)), options)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("persist.json");

        let original = create_test_index().await;
        save_index(&original, &path).unwrap();
        assert!(index_exists(&path));

        let loaded = load_index(&path).unwrap();
        assert_eq!(loaded.config_name, "persist");
        assert_eq!(loaded.metric(), DistanceMetric::Cosine);
        assert_eq!(loaded.len(), original.len());
        assert_eq!(loaded.entries()[0].embedding, original.entries()[0].embedding);
        assert_eq!(loaded.entries()[0].chunk, original.entries()[0].chunk);
    }

    #[tokio::test]
    async fn test_save_and_load_bincode() {
        let dir = TempDir::new().unwrap();
        let path = index_path(&dir.path().join("nested"), "persist", SaveFormat::Bincode);

        let original = create_test_index().await;
        save_index(&original, &path).unwrap();

        let loaded = load_index(&path).unwrap();
        assert_eq!(loaded.model, original.model);
        assert_eq!(loaded.dims, 32);
        assert_eq!(loaded.len(), original.len());
        assert!(index_size(&path).unwrap() > 0);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(SaveFormat::from_path(Path::new("i.json")), SaveFormat::Json);
        assert_eq!(SaveFormat::from_path(Path::new("i.bin")), SaveFormat::Bincode);
        assert_eq!(SaveFormat::from_path(Path::new("i.bincode")), SaveFormat::Bincode);
        assert_eq!(SaveFormat::from_path(Path::new("i")), SaveFormat::Json);
    }

    #[test]
    fn test_load_nonexistent() {
        let result = load_index(Path::new("/nonexistent/index.json"));
        assert!(matches!(result, Err(ChunkBenchError::IndexNotFound(_))));
    }

    #[test]
    fn test_load_garbage_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "not an index").unwrap();
        assert!(matches!(
            load_index(&path),
            Err(ChunkBenchError::Serialization(_))
        ));
    }
}
