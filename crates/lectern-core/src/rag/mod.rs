//! Indexing, answering and feedback over an in-process slide index.

pub mod prompt;
mod types;

use std::path::Path;

use lectern_llm::{DecodingConfig, EmbeddingProvider, GenerationProvider};
use lectern_memory::{IndexedVector, TextExtractor, VectorIndex, VectorIndexError, check_finite};

pub use types::{AnswerResult, FeedbackResult, SourceSlide};

use crate::config::Config;
use crate::error::RagError;

/// Retrieval breadth and decoding controls for both workflows.
#[derive(Debug, Clone)]
pub struct RagSettings {
    /// Pages used as generation context for an answer.
    pub answer_context_k: usize,
    /// Pages cited with an answer; a prefix of the context pages.
    pub answer_citations: usize,
    pub feedback_context_k: usize,
    pub answer_decoding: DecodingConfig,
    pub feedback_decoding: DecodingConfig,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RagSettings {
    fn from(config: &Config) -> Self {
        Self {
            answer_context_k: config.retrieval.answer_context_k,
            answer_citations: config.retrieval.answer_citations,
            feedback_context_k: config.retrieval.feedback_context_k,
            answer_decoding: config.generation.answer.clone(),
            feedback_decoding: config.generation.feedback.clone(),
        }
    }
}

impl RagSettings {
    /// # Errors
    ///
    /// Returns [`RagError::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.answer_context_k == 0 {
            return Err(RagError::Config(
                "retrieval.answer_context_k must be greater than zero".into(),
            ));
        }
        if self.feedback_context_k == 0 {
            return Err(RagError::Config(
                "retrieval.feedback_context_k must be greater than zero".into(),
            ));
        }
        if self.answer_citations > self.answer_context_k {
            return Err(RagError::Config(format!(
                "retrieval.answer_citations ({}) exceeds retrieval.answer_context_k ({})",
                self.answer_citations, self.answer_context_k
            )));
        }
        self.answer_decoding
            .validate()
            .map_err(|e| RagError::Config(format!("generation.answer: {e}")))?;
        self.feedback_decoding
            .validate()
            .map_err(|e| RagError::Config(format!("generation.feedback: {e}")))?;
        Ok(())
    }
}

/// Owns the extractor, embedder, index and generator for one corpus.
///
/// The index is cleared at construction; nothing else is kept between calls.
pub struct RagOrchestrator<E: EmbeddingProvider, G: GenerationProvider> {
    extractor: Box<dyn TextExtractor>,
    embedder: E,
    index: Box<dyn VectorIndex>,
    generator: G,
    settings: RagSettings,
}

impl<E: EmbeddingProvider, G: GenerationProvider> RagOrchestrator<E, G> {
    /// # Errors
    ///
    /// Returns [`RagError::Config`] for invalid settings and
    /// [`VectorIndexError::DimensionMismatch`] when the embedder and the index
    /// disagree on vector length.
    pub async fn new(
        extractor: Box<dyn TextExtractor>,
        embedder: E,
        index: Box<dyn VectorIndex>,
        generator: G,
        settings: RagSettings,
    ) -> Result<Self, RagError> {
        settings.validate()?;
        if embedder.dimension() != index.dimension() {
            return Err(VectorIndexError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimension(),
            }
            .into());
        }
        index.reset().await?;
        tracing::info!(
            embedder = embedder.name(),
            generator = generator.name(),
            dimension = index.dimension(),
            "rag orchestrator ready"
        );
        Ok(Self {
            extractor,
            embedder,
            index,
            generator,
            settings,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Extract, embed and store every non-blank page of `path`.
    ///
    /// Returns the number of pages indexed. Re-indexing a file replaces its
    /// pages in place. Every page is embedded before any is stored, so a
    /// failed document leaves the index untouched.
    ///
    /// # Errors
    ///
    /// Returns an extraction error for unreadable files, or an embedding or
    /// index error.
    pub async fn index_document(&self, path: &Path) -> Result<usize, RagError> {
        let pages = self.extractor.extract(path).await?;
        tracing::debug!(path = %path.display(), pages = pages.len(), "extracted pages");

        let mut entries = Vec::with_capacity(pages.len());
        for page in pages {
            let embedding = self.embedder.embed(&page.text).await?;
            let id = page.index_id();
            check_finite(&id, &embedding)?;
            entries.push(IndexedVector {
                id,
                embedding,
                metadata: page.metadata(),
                document_text: page.text,
            });
        }

        let indexed = entries.len();
        for entry in entries {
            self.index.upsert(entry).await?;
        }

        tracing::info!(path = %path.display(), indexed, "document indexed");
        Ok(indexed)
    }

    /// Answer `question` from the best-matching slides.
    ///
    /// An empty index yields no sources and an answer generated from an empty
    /// context block.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding, the index query, or generation fails.
    pub async fn answer_question(&self, question: &str) -> Result<AnswerResult, RagError> {
        let mut slides = self
            .retrieve(question, self.settings.answer_context_k)
            .await?;

        let context = prompt::format_answer_context(&slides);
        let prompt = prompt::answer_prompt(&context, question);
        let answer = self
            .generator
            .generate(&prompt, &self.settings.answer_decoding)
            .await?;

        slides.truncate(self.settings.answer_citations);
        tracing::debug!(sources = slides.len(), "answer generated");
        Ok(AnswerResult {
            answer,
            sources: slides,
        })
    }

    /// Grade `student_answer` against the slides most relevant to `question`.
    ///
    /// An empty `student_answer` is passed through unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding, the index query, or generation fails.
    pub async fn provide_feedback(
        &self,
        question: &str,
        student_answer: &str,
    ) -> Result<FeedbackResult, RagError> {
        let slides = self
            .retrieve(question, self.settings.feedback_context_k)
            .await?;

        let reference = prompt::format_reference_material(&slides);
        let prompt = prompt::feedback_prompt(question, student_answer, &reference);
        let feedback = self
            .generator
            .generate(&prompt, &self.settings.feedback_decoding)
            .await?;

        tracing::debug!(references = slides.len(), "feedback generated");
        Ok(FeedbackResult {
            feedback,
            reference_slides: slides,
        })
    }

    /// Number of pages currently in the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index state is unavailable.
    pub async fn indexed_count(&self) -> Result<usize, RagError> {
        Ok(self.index.count().await?)
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SourceSlide>, RagError> {
        let embedding = self.embedder.embed(query).await?;
        let hits = self.index.query(embedding, top_k).await?;
        tracing::debug!(top_k, hits = hits.len(), "retrieved slides");
        Ok(hits.into_iter().map(SourceSlide::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::future::Future;
    use std::path::PathBuf;
    use std::pin::Pin;

    use lectern_llm::mock::{MockEmbedder, MockGenerator};
    use lectern_memory::{DocumentError, InMemoryVectorIndex, PageRecord};

    use super::*;

    #[derive(Default)]
    struct FakeExtractor {
        docs: HashMap<PathBuf, Vec<(u32, &'static str)>>,
    }

    impl FakeExtractor {
        fn with(mut self, name: &str, pages: &[(u32, &'static str)]) -> Self {
            self.docs.insert(PathBuf::from(name), pages.to_vec());
            self
        }
    }

    impl TextExtractor for FakeExtractor {
        fn extract(
            &self,
            path: &Path,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<PageRecord>, DocumentError>> + Send + '_>>
        {
            let path = path.to_path_buf();
            Box::pin(async move {
                let pages = self.docs.get(&path).ok_or_else(|| {
                    DocumentError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "no such document",
                    ))
                })?;
                let source_id = path.to_string_lossy().into_owned();
                Ok(pages
                    .iter()
                    .map(|(n, text)| PageRecord {
                        page_number: *n,
                        text: (*text).to_owned(),
                        source_id: source_id.clone(),
                    })
                    .collect())
            })
        }
    }

    async fn orchestrator(
        extractor: FakeExtractor,
        generator: MockGenerator,
    ) -> RagOrchestrator<MockEmbedder, MockGenerator> {
        with_embedder(extractor, MockEmbedder::with_dimension(128), generator).await
    }

    async fn with_embedder<E: EmbeddingProvider>(
        extractor: FakeExtractor,
        embedder: E,
        generator: MockGenerator,
    ) -> RagOrchestrator<E, MockGenerator> {
        let index = InMemoryVectorIndex::new(embedder.dimension());
        RagOrchestrator::new(
            Box::new(extractor),
            embedder,
            Box::new(index),
            generator,
            RagSettings::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn rejects_dimension_mismatch() {
        let result = RagOrchestrator::new(
            Box::new(FakeExtractor::default()),
            MockEmbedder::with_dimension(64),
            Box::new(InMemoryVectorIndex::new(32)),
            MockGenerator::default(),
            RagSettings::default(),
        )
        .await;
        let err = result.err().unwrap();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            RagError::Index(VectorIndexError::DimensionMismatch {
                expected: 32,
                actual: 64
            })
        ));
    }

    #[tokio::test]
    async fn rejects_invalid_settings() {
        let settings = RagSettings {
            answer_citations: 9,
            ..RagSettings::default()
        };
        let result = RagOrchestrator::new(
            Box::new(FakeExtractor::default()),
            MockEmbedder::default(),
            Box::new(InMemoryVectorIndex::new(64)),
            MockGenerator::default(),
            settings,
        )
        .await;
        assert!(matches!(result.err(), Some(RagError::Config(_))));
    }

    #[tokio::test]
    async fn index_document_counts_pages() {
        let extractor = FakeExtractor::default().with("a.pdf", &[(1, "one"), (3, "three")]);
        let rag = orchestrator(extractor, MockGenerator::default()).await;
        assert_eq!(rag.index_document(Path::new("a.pdf")).await.unwrap(), 2);
        assert_eq!(rag.indexed_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn extraction_failure_is_recoverable() {
        let extractor = FakeExtractor::default().with("a.pdf", &[(1, "kept")]);
        let rag = orchestrator(extractor, MockGenerator::default()).await;
        rag.index_document(Path::new("a.pdf")).await.unwrap();

        let err = rag.index_document(Path::new("missing.pdf")).await.unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
        assert!(!err.is_fatal());
        assert_eq!(rag.indexed_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn embedding_failure_mid_document_stores_nothing() {
        let extractor = FakeExtractor::default()
            .with("good.pdf", &[(1, "kept page")])
            .with("bad.pdf", &[(1, "first"), (2, "second"), (3, "third")]);
        // Call 1 embeds good.pdf; calls 2 and 3 succeed for bad.pdf, call 4 fails.
        let embedder = MockEmbedder::failing_from_call(128, 4);
        let rag = with_embedder(extractor, embedder.clone(), MockGenerator::default()).await;
        rag.index_document(Path::new("good.pdf")).await.unwrap();

        let err = rag.index_document(Path::new("bad.pdf")).await.unwrap_err();
        assert!(matches!(err, RagError::Llm(_)));
        assert!(!err.is_fatal());
        assert_eq!(embedder.call_count(), 4);
        assert_eq!(rag.indexed_count().await.unwrap(), 1);
    }

    /// Emits NaN vectors for texts containing "corrupt".
    struct NanEmbedder(MockEmbedder);

    impl EmbeddingProvider for NanEmbedder {
        fn dimension(&self) -> usize {
            self.0.dimension
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, lectern_llm::LlmError> {
            if text.contains("corrupt") {
                return Ok(vec![f32::NAN; self.0.dimension]);
            }
            self.0.embed(text).await
        }

        #[allow(clippy::unnecessary_literal_bound)]
        fn name(&self) -> &str {
            "nan"
        }
    }

    #[tokio::test]
    async fn non_finite_embedding_skips_whole_document() {
        let extractor = FakeExtractor::default()
            .with("a.pdf", &[(1, "fine page")])
            .with("b.pdf", &[(1, "also fine"), (2, "corrupt page")]);
        let embedder = NanEmbedder(MockEmbedder::with_dimension(32));
        let rag = with_embedder(extractor, embedder, MockGenerator::default()).await;
        rag.index_document(Path::new("a.pdf")).await.unwrap();

        let err = rag.index_document(Path::new("b.pdf")).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::Index(VectorIndexError::NonFinite { ref id }) if id == "b.pdf_page_2"
        ));
        assert!(!err.is_fatal());
        assert_eq!(rag.indexed_count().await.unwrap(), 1);

        let result = rag.answer_question("fine").await.unwrap();
        assert!(result.sources.iter().all(|s| s.source == "a.pdf"));
    }

    #[tokio::test]
    async fn answer_uses_answer_decoding() {
        let extractor = FakeExtractor::default().with("a.pdf", &[(1, "Paris is in France")]);
        let generator = MockGenerator::with_response("Paris.");
        let rag = orchestrator(extractor, generator.clone()).await;
        rag.index_document(Path::new("a.pdf")).await.unwrap();

        let result = rag.answer_question("Where is Paris?").await.unwrap();
        assert_eq!(result.answer, "Paris.");
        assert_eq!(result.sources.len(), 1);

        let (prompt, config) = generator.calls().pop().unwrap();
        assert!(prompt.contains("--- SLIDE 1 ---\nParis is in France\n"));
        assert_eq!(config, rag.settings().answer_decoding);
    }

    #[tokio::test]
    async fn feedback_uses_feedback_decoding() {
        let extractor = FakeExtractor::default().with("a.pdf", &[(2, "Gradient descent")]);
        let generator = MockGenerator::default();
        let rag = orchestrator(extractor, generator.clone()).await;
        rag.index_document(Path::new("a.pdf")).await.unwrap();

        let result = rag
            .provide_feedback("What is gradient descent?", "It goes downhill")
            .await
            .unwrap();
        assert_eq!(result.reference_slides.len(), 1);
        assert_eq!(result.reference_slides[0].page, 2);

        let (prompt, config) = generator.calls().pop().unwrap();
        assert!(prompt.contains("Slide 2: Gradient descent"));
        assert!(prompt.contains("It goes downhill"));
        assert_eq!(config.min_output_tokens, 80);
        assert_eq!(config.max_output_tokens, 350);
    }

    #[tokio::test]
    async fn generation_failure_propagates() {
        let rag = orchestrator(FakeExtractor::default(), MockGenerator::failing()).await;
        let err = rag.answer_question("anything").await.unwrap_err();
        assert!(matches!(err, RagError::Llm(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn construction_resets_index() {
        let index = InMemoryVectorIndex::new(16);
        index
            .upsert(IndexedVector {
                id: "stale".into(),
                embedding: vec![1.0; 16],
                document_text: "stale".into(),
                metadata: lectern_memory::PageMetadata {
                    page_number: 1,
                    source_id: "old.pdf".into(),
                },
            })
            .await
            .unwrap();
        let rag = RagOrchestrator::new(
            Box::new(FakeExtractor::default()),
            MockEmbedder::with_dimension(16),
            Box::new(index),
            MockGenerator::default(),
            RagSettings::default(),
        )
        .await
        .unwrap();
        assert_eq!(rag.indexed_count().await.unwrap(), 0);
    }
}
