use std::path::Path;
use std::pin::Pin;

use super::{DEFAULT_MAX_FILE_SIZE, DocumentError, TextExtractor, pages_to_records};
use crate::types::PageRecord;

/// Page-by-page plain-text extraction from PDF files.
pub struct PdfExtractor {
    pub max_file_size: u64,
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl PdfExtractor {
    #[must_use]
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }
}

/// File name of `path` as given. Symlinked decks keep the name they were
/// added under.
fn source_id(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

impl TextExtractor for PdfExtractor {
    fn extract(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<PageRecord>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            if !has_pdf_extension(&path) {
                return Err(DocumentError::UnsupportedFormat(path.display().to_string()));
            }
            let source_id = source_id(&path);
            let path = tokio::fs::canonicalize(&path).await?;

            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > max_size {
                return Err(DocumentError::FileTooLarge(meta.len()));
            }

            let pages = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_by_pages(&path)
                    .map_err(|e| DocumentError::Pdf(e.to_string()))
            })
            .await
            .map_err(|e| DocumentError::Pdf(format!("extraction task failed: {e}")))??;

            let total = pages.len();
            let records = pages_to_records(pages, &source_id);
            tracing::debug!(
                source = %source_id,
                pages = total,
                kept = records.len(),
                "extracted PDF text"
            );
            Ok(records)
        })
    }
}
