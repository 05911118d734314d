pub mod error;
pub mod pages;
#[cfg(feature = "pdf")]
pub mod pdf;

pub use error::DocumentError;
pub use pages::{clean_page_text, pages_to_records};

#[cfg(feature = "pdf")]
pub use pdf::PdfExtractor;

use crate::types::PageRecord;

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Turns a document file into its non-blank pages, in physical page order.
pub trait TextExtractor: Send + Sync {
    fn extract(
        &self,
        path: &std::path::Path,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<PageRecord>, DocumentError>> + Send + '_>,
    >;
}
