#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[cfg(feature = "candle")]
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether the error means the provider itself is unusable, as opposed to a
    /// single failed request.
    #[must_use]
    pub fn is_model_load(&self) -> bool {
        matches!(self, Self::ModelLoad(_))
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
