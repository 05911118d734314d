//! Retrieval-augmented question answering and answer feedback over lecture slides.

#[cfg(all(feature = "candle", feature = "pdf"))]
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod rag;

pub use config::Config;
pub use error::RagError;
pub use rag::{AnswerResult, FeedbackResult, RagOrchestrator, RagSettings, SourceSlide};
