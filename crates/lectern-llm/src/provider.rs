use crate::decoding::DecodingConfig;
use crate::error::LlmError;

/// Maps text to a fixed-length dense vector.
///
/// The same provider instance must embed both indexed documents and queries;
/// vectors from different models are not comparable.
pub trait EmbeddingProvider: Send + Sync {
    /// Length of every vector returned by [`embed`](Self::embed).
    fn dimension(&self) -> usize;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization or the model forward pass fails.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    fn name(&self) -> &str;
}

/// Maps a prompt to a generated completion under explicit decoding controls.
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion for `prompt`.
    ///
    /// With `config.deterministic` set, identical inputs must produce identical output.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization, the forward pass, or decoding fails.
    fn generate(
        &self,
        prompt: &str,
        config: &DecodingConfig,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    fn name(&self) -> &str;
}
