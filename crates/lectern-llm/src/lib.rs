//! Embedding and generation provider abstractions and backend implementations.

#[cfg(feature = "candle")]
pub mod candle_provider;
pub mod decoding;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod provider;

pub use decoding::DecodingConfig;
pub use error::LlmError;
pub use provider::{EmbeddingProvider, GenerationProvider};
