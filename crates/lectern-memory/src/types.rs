use serde::Serialize;

/// One extracted, non-blank page of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// 1-based position within the source document.
    pub page_number: u32,
    pub text: String,
    /// File name of the originating document.
    pub source_id: String,
}

impl PageRecord {
    /// Index id, unique per `(source_id, page_number)`.
    #[must_use]
    pub fn index_id(&self) -> String {
        page_id(&self.source_id, self.page_number)
    }

    #[must_use]
    pub fn metadata(&self) -> PageMetadata {
        PageMetadata {
            page_number: self.page_number,
            source_id: self.source_id.clone(),
        }
    }
}

#[must_use]
pub fn page_id(source_id: &str, page_number: u32) -> String {
    format!("{source_id}_page_{page_number}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    pub page_number: u32,
    pub source_id: String,
}

/// An entry as handed to the index.
#[derive(Debug, Clone)]
pub struct IndexedVector {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document_text: String,
    pub metadata: PageMetadata,
}

/// A query hit, best first in query results.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub id: String,
    pub score: f32,
    pub document_text: String,
    pub metadata: PageMetadata,
}
