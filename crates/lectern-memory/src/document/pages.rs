use crate::types::PageRecord;

/// Normalize raw page text: every line break becomes a space, then the result
/// is trimmed. Returns `None` for blank pages.
#[must_use]
pub fn clean_page_text(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }
    let text = raw.replace("\r\n", " ").replace(['\n', '\r'], " ");
    Some(text.trim().to_owned())
}

/// Build records from raw page texts in page order, numbering from 1 and
/// skipping blank pages. Identical pages are kept.
#[must_use]
pub fn pages_to_records<I, S>(pages: I, source_id: &str) -> Vec<PageRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pages
        .into_iter()
        .zip(1u32..)
        .filter_map(|(raw, page_number)| {
            clean_page_text(raw.as_ref()).map(|text| PageRecord {
                page_number,
                text,
                source_id: source_id.to_owned(),
            })
        })
        .collect()
}
