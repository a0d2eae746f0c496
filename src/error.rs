//! Error types for the question-answering core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    /// The completion service failed while generating an answer.
    #[error("Completion service error: {0:#}")]
    Completion(anyhow::Error),

    /// The vector index failed during similarity search.
    #[error("Retrieval error: {0:#}")]
    Retrieval(anyhow::Error),

    /// An explicit scope outside the catalog, rejected under strict validation.
    #[error("Unknown document scope: {0}")]
    UnknownScope(String),

    #[error("Prompt template error: {0}")]
    Prompt(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl RagError {
    /// Whether the caller is at fault rather than a backing service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RagError::UnknownScope(_))
    }
}
