use lectern_memory::ScoredEntry;
use serde::Serialize;

/// A retrieved slide as surfaced to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSlide {
    pub text: String,
    pub page: u32,
    pub source: String,
}

impl From<ScoredEntry> for SourceSlide {
    fn from(entry: ScoredEntry) -> Self {
        Self {
            text: entry.document_text,
            page: entry.metadata.page_number,
            source: entry.metadata.source_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    /// Leading entries of the generation context, best first.
    pub sources: Vec<SourceSlide>,
}

/// Free-form graded feedback. The labeled sections are requested in the prompt
/// but never parsed or checked.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResult {
    pub feedback: String,
    pub reference_slides: Vec<SourceSlide>,
}
