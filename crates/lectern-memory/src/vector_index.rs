use std::future::Future;
use std::pin::Pin;

use crate::types::{IndexedVector, ScoredEntry};

#[derive(Debug, thiserror::Error)]
pub enum VectorIndexError {
    /// The embedding provider and the index disagree on vector length.
    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// An embedding holds NaN or an infinity and cannot be ranked.
    #[error("embedding for {id} has non-finite values")]
    NonFinite { id: String },
    #[error("index state unavailable: {0}")]
    Lock(String),
}

/// Rejects embeddings that contain NaN or infinite components.
///
/// # Errors
///
/// Returns [`VectorIndexError::NonFinite`] naming `id`.
pub fn check_finite(id: &str, embedding: &[f32]) -> Result<(), VectorIndexError> {
    if embedding.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(VectorIndexError::NonFinite { id: id.to_owned() })
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Nearest-neighbour store for page embeddings of one corpus.
pub trait VectorIndex: Send + Sync {
    /// Vector length every entry and query must have.
    fn dimension(&self) -> usize;

    /// Remove every entry. Idempotent.
    fn reset(&self) -> BoxFuture<'_, Result<(), VectorIndexError>>;

    /// Insert `entry`, replacing any entry with the same id. Non-finite
    /// embeddings are rejected.
    fn upsert(&self, entry: IndexedVector) -> BoxFuture<'_, Result<(), VectorIndexError>>;

    /// The `top_k` entries most similar to `embedding`, best first. Equal scores
    /// keep insertion order. An empty index yields an empty result.
    fn query(
        &self,
        embedding: Vec<f32>,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredEntry>, VectorIndexError>>;

    fn count(&self) -> BoxFuture<'_, Result<usize, VectorIndexError>>;
}
