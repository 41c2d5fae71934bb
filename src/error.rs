//! Error types for chunk-bench.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, ChunkBenchError>;

/// Errors that can occur while building, querying or evaluating indexes.
#[derive(Error, Debug)]
pub enum ChunkBenchError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The corpus directory does not exist or is not a directory.
    #[error("Corpus path '{0}' does not exist or is not a directory")]
    InvalidCorpusPath(PathBuf),

    /// No documents found in the corpus.
    #[error("No documents found in corpus at '{0}'")]
    EmptyCorpus(PathBuf),

    /// The index file does not exist.
    #[error("Index file not found at '{0}'")]
    IndexNotFound(PathBuf),

    /// Invalid configuration: chunk sizing, evaluation mode, fusion weight,
    /// missing credentials.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configuration's index could not be built or is unusable.
    #[error("Index error for config '{config}': {message}")]
    Index { config: String, message: String },

    /// The embedding provider failed.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The reasoning oracle failed for a query (after retries, or with a
    /// response that cannot be trusted).
    #[error("Oracle error for query '{query}': {message}")]
    Oracle { query: String, message: String },

    /// A call did not finish in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// LLM API error.
    #[error("LLM API error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    LlmApi { status: Option<u16>, message: String },

    /// LLM response parsing error.
    #[error("Failed to parse LLM response: {0}")]
    LlmParse(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),
}

impl ChunkBenchError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an index error for a configuration.
    pub fn index(config: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Index {
            config: config.into(),
            message: message.into(),
        }
    }

    /// Whether a remote call that failed this way is worth trying again.
    ///
    /// Transport failures, timeouts, rate limits, auth hiccups and server
    /// errors are retried. Parse failures are not: the same prompt would
    /// most likely produce the same unusable answer.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChunkBenchError::Timeout(_) | ChunkBenchError::Http(_) => true,
            ChunkBenchError::LlmApi { status, .. } => match status {
                Some(code) => *code == 401 || *code == 403 || *code == 429 || *code >= 500,
                None => true,
            },
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ChunkBenchError {
    fn from(err: reqwest::Error) -> Self {
        ChunkBenchError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for ChunkBenchError {
    fn from(err: serde_json::Error) -> Self {
        ChunkBenchError::LlmParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ChunkBenchError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ChunkBenchError::Http("connection reset".into()).is_retryable());
        assert!(
            ChunkBenchError::LlmApi {
                status: Some(429),
                message: "slow down".into()
            }
            .is_retryable()
        );
        assert!(
            ChunkBenchError::LlmApi {
                status: Some(503),
                message: "unavailable".into()
            }
            .is_retryable()
        );
        assert!(
            !ChunkBenchError::LlmApi {
                status: Some(400),
                message: "bad request".into()
            }
            .is_retryable()
        );
        assert!(!ChunkBenchError::LlmParse("not json".into()).is_retryable());
        assert!(!ChunkBenchError::Config("bad".into()).is_retryable());
    }

    #[test]
    fn test_messages_name_config_and_query() {
        let err = ChunkBenchError::index("dense_optimized", "no chunks");
        assert!(err.to_string().contains("dense_optimized"));

        let err = ChunkBenchError::Oracle {
            query: "What is the capital?".into(),
            message: "missing config".into(),
        };
        assert!(err.to_string().contains("What is the capital?"));

        let err = ChunkBenchError::LlmApi {
            status: Some(500),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "LLM API error (500): boom");
    }
}
