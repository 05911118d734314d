//! Build a ready orchestrator from configuration with the candle backends.

use lectern_llm::{EmbeddingProvider, LlmError};
use lectern_llm::candle_provider::{BertEmbedder, ModelSource, T5Generator, device_from_name};
use lectern_memory::document::PdfExtractor;
use lectern_memory::InMemoryVectorIndex;

use crate::config::Config;
use crate::error::RagError;
use crate::rag::{RagOrchestrator, RagSettings};

pub type CandleOrchestrator = RagOrchestrator<BertEmbedder, T5Generator>;

/// Load both models and wire them to a fresh in-memory index.
///
/// Expensive: model files may be downloaded and weights are loaded onto the
/// configured device. Run once per process.
///
/// # Errors
///
/// Returns [`LlmError::ModelLoad`] (fatal) if either model cannot be loaded, or
/// [`RagError::Config`] for invalid settings.
pub async fn build_orchestrator(config: &Config) -> Result<CandleOrchestrator, RagError> {
    let settings = RagSettings::from(config);
    settings.validate()?;

    let device = device_from_name(&config.models.device)?;
    let embedding_source = ModelSource::parse(&config.models.embedding_repo);
    let generation_source = ModelSource::parse(&config.models.generation_repo);
    let max_tokens = config.models.embed_max_tokens;

    tracing::info!(
        embedding = %embedding_source,
        generation = %generation_source,
        device = %config.models.device,
        "loading models"
    );

    let (embedder, generator) = tokio::task::spawn_blocking(move || {
        let embedder = BertEmbedder::load(&embedding_source, max_tokens, &device)?;
        let generator = T5Generator::load(&generation_source, &device)?;
        Ok::<_, LlmError>((embedder, generator))
    })
    .await
    .map_err(|e| LlmError::ModelLoad(format!("model loading task failed: {e}")))??;

    let index = InMemoryVectorIndex::new(embedder.dimension());
    let extractor = PdfExtractor::new(config.documents.max_file_size);

    RagOrchestrator::new(
        Box::new(extractor),
        embedder,
        Box::new(index),
        generator,
        settings,
    )
    .await
}
