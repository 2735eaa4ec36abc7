//! Error types for the pipeline optimizer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur while indexing, answering or judging.
#[derive(Error, Debug)]
pub enum RagError {
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

    /// A pipeline configuration is malformed (bad chunk parameters, duplicate ids).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The embedding backend failed or returned a malformed batch.
    #[error("Embedding failed for model '{model}': {reason}")]
    Embedding { model: String, reason: String },

    /// The generation model failed to produce an answer.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The judge output could not be read as a verdict.
    #[error("Failed to parse judge response: {0}")]
    JudgeParse(String),

    /// Chunk and embedding batches disagree in length.
    #[error("Index input mismatch: {chunks} chunks but {embeddings} embeddings")]
    IndexMismatch { chunks: usize, embeddings: usize },

    /// Embeddings in one index have different lengths.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The ingestion boundary cannot decode this file type.
    #[error("Unsupported document '{0}'")]
    UnsupportedDocument(String),

    /// Caller supplied an unusable request.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The index snapshot does not exist.
    #[error("Index file not found at '{0}'")]
    IndexNotFound(PathBuf),

    /// LLM API error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an embedding failure for the given model.
    pub fn embedding(model: impl Into<String>, reason: impl ToString) -> Self {
        Self::Embedding {
            model: model.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}
