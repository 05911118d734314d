use lectern_llm::LlmError;
use lectern_memory::{DocumentError, VectorIndexError};

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] DocumentError),

    #[error("vector index error: {0}")]
    Index(#[from] VectorIndexError),

    #[error("model error: {0}")]
    Llm(#[from] LlmError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RagError {
    /// Fatal errors mean the orchestrator cannot be trusted for further calls.
    /// Everything else affects only the document or request that raised it.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Extraction(_) | Self::Index(VectorIndexError::NonFinite { .. }) => false,
            Self::Index(_) | Self::Config(_) => true,
            Self::Llm(e) => e.is_model_load(),
        }
    }
}
