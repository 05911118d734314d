//! Slide ingestion and vector storage: PDF pages become [`PageRecord`]s, which
//! are embedded elsewhere and stored in a [`VectorIndex`].

pub mod document;
pub mod in_memory_index;
pub mod types;
pub mod vector_index;

pub use document::{DocumentError, TextExtractor};
pub use in_memory_index::InMemoryVectorIndex;
pub use types::{IndexedVector, PageMetadata, PageRecord, ScoredEntry};
pub use vector_index::{VectorIndex, VectorIndexError, check_finite};
