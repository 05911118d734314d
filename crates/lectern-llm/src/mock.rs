//! Test-only mock embedding and generation providers.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::decoding::DecodingConfig;
use crate::error::LlmError;
use crate::provider::{EmbeddingProvider, GenerationProvider};

/// Hashed bag-of-words embedder: texts sharing words get positive cosine similarity.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimension: usize,
    pub fail: bool,
    /// Fail the call with this 1-based number, and every call after it.
    pub fail_from_call: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimension: 64,
            fail: false,
            fail_from_call: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_from_call(dimension: usize, call: usize) -> Self {
        Self {
            dimension,
            fail_from_call: Some(call),
            ..Self::default()
        }
    }

    /// Number of `embed` calls made so far, across clones.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            #[allow(clippy::cast_possible_truncation)]
            let slot = (hasher.finish() % self.dimension as u64) as usize;
            vector[slot] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl EmbeddingProvider for MockEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail || self.fail_from_call.is_some_and(|n| call >= n) {
            return Err(LlmError::Inference("mock embed error".into()));
        }
        Ok(self.embed_sync(text))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

/// Generator that records every call and answers deterministically.
///
/// Without a fixed response it emits `min_output_tokens` words (at least one)
/// drawn from the end of the prompt.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator {
    calls: Arc<Mutex<Vec<(String, DecodingConfig)>>>,
    pub response: Option<String>,
    pub fail: bool,
}

impl MockGenerator {
    #[must_use]
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Prompts and decoding configs seen so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, DecodingConfig)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn last_prompt(&self) -> Option<String> {
        self.calls().pop().map(|(prompt, _)| prompt)
    }

    fn synthesize(prompt: &str, config: &DecodingConfig) -> String {
        let words: Vec<&str> = prompt.split_whitespace().collect();
        let target = config
            .min_output_tokens
            .max(1)
            .min(config.max_output_tokens.max(1));
        if words.is_empty() {
            return vec!["generated"; target].join(" ");
        }
        words.iter().rev().cycle().take(target).copied().collect::<Vec<_>>().join(" ")
    }
}

impl GenerationProvider for MockGenerator {
    async fn generate(&self, prompt: &str, config: &DecodingConfig) -> Result<String, LlmError> {
        self.calls
            .lock()
            .map_err(|e| LlmError::Other(format!("mock lock poisoned: {e}")))?
            .push((prompt.to_owned(), config.clone()));
        if self.fail {
            return Err(LlmError::Inference("mock generation error".into()));
        }
        Ok(self
            .response
            .clone()
            .unwrap_or_else(|| Self::synthesize(prompt, config)))
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn embedder_is_deterministic_and_normalized() {
        let embedder = MockEmbedder::default();
        let a = embedder.embed("Paris is the capital").await.unwrap();
        let b = embedder.embed("Paris is the capital").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_words_score_higher() {
        let embedder = MockEmbedder::with_dimension(256);
        let doc = embedder.embed("The capital of France is Paris.").await.unwrap();
        let related = embedder.embed("What is the capital of France?").await.unwrap();
        let unrelated = embedder.embed("gradient descent converges").await.unwrap();
        assert!(cosine(&doc, &related) > cosine(&doc, &unrelated));
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let v = MockEmbedder::default().embed("   ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn failing_embedder_errors() {
        assert!(MockEmbedder::failing().embed("x").await.is_err());
    }

    #[tokio::test]
    async fn embedder_fails_from_numbered_call() {
        let embedder = MockEmbedder::failing_from_call(8, 2);
        let shared = embedder.clone();
        assert!(embedder.embed("a").await.is_ok());
        assert!(shared.embed("b").await.is_err());
        assert!(embedder.embed("c").await.is_err());
        assert_eq!(embedder.call_count(), 3);
    }

    #[tokio::test]
    async fn generator_meets_min_tokens_and_records_calls() {
        let generator = MockGenerator::default();
        let config = DecodingConfig {
            min_output_tokens: 7,
            max_output_tokens: 20,
            ..DecodingConfig::default()
        };
        let out = generator.generate("alpha beta", &config).await.unwrap();
        assert_eq!(out.split_whitespace().count(), 7);
        assert_eq!(generator.calls().len(), 1);
        assert_eq!(generator.last_prompt().as_deref(), Some("alpha beta"));
    }

    #[tokio::test]
    async fn generator_fixed_response_and_failure() {
        let fixed = MockGenerator::with_response("fixed");
        let out = fixed.generate("p", &DecodingConfig::default()).await.unwrap();
        assert_eq!(out, "fixed");

        let failing = MockGenerator::failing();
        assert!(failing.generate("p", &DecodingConfig::default()).await.is_err());
        assert_eq!(failing.calls().len(), 1);
    }
}
