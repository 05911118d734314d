use std::path::{Path, PathBuf};

use anyhow::Context;
use lectern_core::{RagError, RagOrchestrator, SourceSlide};
use lectern_llm::{EmbeddingProvider, GenerationProvider};

/// Characters of slide text shown under each citation.
pub const PREVIEW_CHARS: usize = 500;

/// Outcome of indexing one slide deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDeck {
    pub path: PathBuf,
    pub pages: usize,
}

impl IndexedDeck {
    #[must_use]
    pub fn name(&self) -> String {
        self.path.file_name().map_or_else(
            || self.path.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        )
    }
}

/// All `*.pdf` files directly inside `dir`, sorted by path. The folder is
/// created when missing.
///
/// # Errors
///
/// Returns an error if the folder cannot be created or listed.
pub async fn scan_pdfs(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create data folder {}", dir.display()))?;

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to list data folder {}", dir.display()))?;
    let mut pdfs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf && entry.file_type().await?.is_file() {
            pdfs.push(path);
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

/// Index every path once, in order. Recoverable failures are logged and the
/// deck is skipped; fatal ones abort.
///
/// # Errors
///
/// Returns the first fatal [`RagError`].
pub async fn index_library<E, G>(
    rag: &RagOrchestrator<E, G>,
    paths: &[PathBuf],
) -> Result<Vec<IndexedDeck>, RagError>
where
    E: EmbeddingProvider,
    G: GenerationProvider,
{
    let mut seen: Vec<&PathBuf> = Vec::with_capacity(paths.len());
    let mut decks = Vec::with_capacity(paths.len());
    for path in paths {
        if seen.contains(&path) {
            continue;
        }
        seen.push(path);
        match rag.index_document(path).await {
            Ok(pages) => decks.push(IndexedDeck {
                path: path.clone(),
                pages,
            }),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::warn!(path = %path.display(), "skipping deck: {e}"),
        }
    }
    Ok(decks)
}

/// First `limit` characters of `text` followed by `...`.
#[must_use]
pub fn preview(text: &str, limit: usize) -> String {
    let mut out: String = text.chars().take(limit).collect();
    out.push_str("...");
    out
}

/// `source - Slide N` header plus an indented text preview, numbered from 1.
#[must_use]
pub fn render_slides(label: &str, slides: &[SourceSlide]) -> String {
    let mut out = String::new();
    for (i, slide) in slides.iter().enumerate() {
        out.push_str(&format!(
            "{label} {}: {} - Slide {}\n    {}\n",
            i + 1,
            slide.source,
            slide.page,
            preview(&slide.text, PREVIEW_CHARS)
        ));
    }
    out
}

/// Trimmed input, or `None` (with a warning) when it is blank.
#[must_use]
pub fn require_text<'a>(label: &str, text: &'a str) -> Option<&'a str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        tracing::warn!("{label} is empty, nothing to send");
        None
    } else {
        Some(trimmed)
    }
}
