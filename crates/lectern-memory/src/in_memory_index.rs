use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use crate::types::{IndexedVector, PageMetadata, ScoredEntry};
use crate::vector_index::{VectorIndex, VectorIndexError, check_finite};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

struct StoredEntry {
    id: String,
    embedding: Vec<f32>,
    document_text: String,
    metadata: PageMetadata,
}

#[derive(Default)]
struct IndexState {
    // Insertion order; replaced entries keep their original slot.
    entries: Vec<StoredEntry>,
    positions: HashMap<String, usize>,
}

/// Process-local cosine-similarity index with a fixed vector dimension.
pub struct InMemoryVectorIndex {
    dimension: usize,
    state: RwLock<IndexState>,
}

impl InMemoryVectorIndex {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            state: RwLock::new(IndexState::default()),
        }
    }

    fn check_dimension(&self, actual: usize) -> Result<(), VectorIndexError> {
        if actual == self.dimension {
            Ok(())
        } else {
            Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                actual,
            })
        }
    }
}

impl std::fmt::Debug for InMemoryVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorIndex")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

// Accumulates in f64 so large finite components cannot overflow to NaN.
#[allow(clippy::cast_possible_truncation)]
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f32
}

impl VectorIndex for InMemoryVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn reset(&self) -> BoxFuture<'_, Result<(), VectorIndexError>> {
        Box::pin(async move {
            let mut state = self
                .state
                .write()
                .map_err(|e| VectorIndexError::Lock(e.to_string()))?;
            state.entries.clear();
            state.positions.clear();
            Ok(())
        })
    }

    fn upsert(&self, entry: IndexedVector) -> BoxFuture<'_, Result<(), VectorIndexError>> {
        Box::pin(async move {
            self.check_dimension(entry.embedding.len())?;
            check_finite(&entry.id, &entry.embedding)?;
            let mut state = self
                .state
                .write()
                .map_err(|e| VectorIndexError::Lock(e.to_string()))?;
            let stored = StoredEntry {
                id: entry.id,
                embedding: entry.embedding,
                document_text: entry.document_text,
                metadata: entry.metadata,
            };
            if let Some(&pos) = state.positions.get(&stored.id) {
                state.entries[pos] = stored;
            } else {
                let pos = state.entries.len();
                state.positions.insert(stored.id.clone(), pos);
                state.entries.push(stored);
            }
            Ok(())
        })
    }

    fn query(
        &self,
        embedding: Vec<f32>,
        top_k: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredEntry>, VectorIndexError>> {
        Box::pin(async move {
            let state = self
                .state
                .read()
                .map_err(|e| VectorIndexError::Lock(e.to_string()))?;
            if state.entries.is_empty() || top_k == 0 {
                return Ok(Vec::new());
            }
            self.check_dimension(embedding.len())?;
            check_finite("query", &embedding)?;

            let mut scored: Vec<(f32, &StoredEntry)> = state
                .entries
                .iter()
                .map(|e| (cosine_similarity(&embedding, &e.embedding), e))
                .collect();
            // Stable sort: ties stay in insertion order.
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            scored.truncate(top_k);

            Ok(scored
                .into_iter()
                .map(|(score, e)| ScoredEntry {
                    id: e.id.clone(),
                    score,
                    document_text: e.document_text.clone(),
                    metadata: e.metadata.clone(),
                })
                .collect())
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<usize, VectorIndexError>> {
        Box::pin(async move {
            let state = self
                .state
                .read()
                .map_err(|e| VectorIndexError::Lock(e.to_string()))?;
            Ok(state.entries.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn entry(id: &str, embedding: Vec<f32>, text: &str) -> IndexedVector {
        IndexedVector {
            id: id.into(),
            embedding,
            document_text: text.into(),
            metadata: PageMetadata {
                page_number: 1,
                source_id: "deck.pdf".into(),
            },
        }
    }

    #[tokio::test]
    async fn query_empty_index_returns_nothing() {
        let index = InMemoryVectorIndex::new(3);
        let hits = index.query(vec![1.0, 0.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn query_empty_index_ignores_query_dimension() {
        let index = InMemoryVectorIndex::new(3);
        assert!(index.query(vec![1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_and_rank_by_similarity() {
        let index = InMemoryVectorIndex::new(3);
        index.upsert(entry("a", vec![0.0, 1.0, 0.0], "alpha")).await.unwrap();
        index.upsert(entry("b", vec![1.0, 0.0, 0.0], "beta")).await.unwrap();
        index.upsert(entry("c", vec![0.7, 0.7, 0.0], "gamma")).await.unwrap();

        let hits = index.query(vec![1.0, 0.0, 0.0], 3).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
        assert!((hits[0].score - 1.0).abs() < f32::EPSILON);
        assert_eq!(hits[0].document_text, "beta");
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let index = InMemoryVectorIndex::new(2);
        for id in ["first", "second", "third"] {
            index.upsert(entry(id, vec![1.0, 1.0], id)).await.unwrap();
        }
        let hits = index.query(vec![1.0, 1.0], 3).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn upsert_same_id_overwrites() {
        let index = InMemoryVectorIndex::new(2);
        index.upsert(entry("p1", vec![1.0, 0.0], "old")).await.unwrap();
        index.upsert(entry("p2", vec![1.0, 0.0], "other")).await.unwrap();
        index.upsert(entry("p1", vec![1.0, 0.0], "new")).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 2);
        let hits = index.query(vec![1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits[0].id, "p1");
        assert_eq!(hits[0].document_text, "new");
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let index = InMemoryVectorIndex::new(3);
        let err = index.upsert(entry("a", vec![1.0, 0.0], "x")).await.unwrap_err();
        assert!(matches!(
            err,
            VectorIndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn query_rejects_wrong_dimension_when_populated() {
        let index = InMemoryVectorIndex::new(2);
        index.upsert(entry("a", vec![1.0, 0.0], "x")).await.unwrap();
        assert!(index.query(vec![1.0, 0.0, 0.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn reset_clears_and_is_idempotent() {
        let index = InMemoryVectorIndex::new(2);
        index.upsert(entry("a", vec![1.0, 0.0], "x")).await.unwrap();
        index.reset().await.unwrap();
        index.reset().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query(vec![1.0, 0.0], 3).await.unwrap().is_empty());

        index.upsert(entry("a", vec![0.0, 1.0], "y")).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_rejects_non_finite_embedding() {
        let index = InMemoryVectorIndex::new(2);
        for bad in [vec![f32::NAN, 1.0], vec![f32::INFINITY, 0.0]] {
            let err = index.upsert(entry("bad", bad, "x")).await.unwrap_err();
            assert!(matches!(err, VectorIndexError::NonFinite { ref id } if id == "bad"));
        }
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn query_rejects_non_finite_query_when_populated() {
        let index = InMemoryVectorIndex::new(2);
        index.upsert(entry("a", vec![1.0, 0.0], "x")).await.unwrap();
        let err = index.query(vec![f32::NAN, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, VectorIndexError::NonFinite { .. }));
    }

    #[tokio::test]
    async fn mixed_nan_and_extreme_entries_rank_without_panicking() {
        let index = InMemoryVectorIndex::new(2);
        for i in 0..64 {
            let embedding = if i % 3 == 0 {
                vec![f32::NAN, 1.0]
            } else if i % 3 == 1 {
                vec![f32::MAX, f32::MAX]
            } else {
                #[allow(clippy::cast_precision_loss)]
                let x = i as f32;
                vec![1.0, x]
            };
            let _ = index.upsert(entry(&format!("e{i}"), embedding, "t")).await;
        }
        assert_eq!(index.count().await.unwrap(), 42);

        let hits = index.query(vec![1.0, 0.5], 5).await.unwrap();
        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|h| h.score.is_finite()));
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn cosine_of_huge_finite_vectors_stays_finite() {
        let score = cosine_similarity(&[f32::MAX, f32::MAX], &[1.0, 1.0]);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_scores_zero() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }

    #[test]
    fn debug_format() {
        let dbg = format!("{:?}", InMemoryVectorIndex::new(8));
        assert!(dbg.contains("InMemoryVectorIndex"));
        assert!(dbg.contains('8'));
    }

    proptest! {
        #[test]
        fn query_returns_min_of_top_k_and_len(entries in 0usize..12, top_k in 0usize..15) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let hits = rt.block_on(async {
                let index = InMemoryVectorIndex::new(2);
                for i in 0..entries {
                    #[allow(clippy::cast_precision_loss)]
                    let x = i as f32 + 1.0;
                    index.upsert(entry(&format!("e{i}"), vec![x, 1.0], "t")).await.unwrap();
                }
                index.query(vec![1.0, 1.0], top_k).await.unwrap()
            });
            prop_assert_eq!(hits.len(), entries.min(top_k));
            for pair in hits.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
