use std::path::PathBuf;

use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LECTERN_EMBEDDING_REPO") {
            self.models.embedding_repo = v;
        }
        if let Ok(v) = std::env::var("LECTERN_GENERATION_REPO") {
            self.models.generation_repo = v;
        }
        if let Ok(v) = std::env::var("LECTERN_DEVICE") {
            self.models.device = v;
        }
        if let Ok(v) = std::env::var("LECTERN_DATA_DIR") {
            self.documents.data_dir = PathBuf::from(v);
        }
        if let Some(n) = parse_env::<u64>("LECTERN_MAX_FILE_SIZE") {
            self.documents.max_file_size = n;
        }
        if let Some(k) = parse_env::<usize>("LECTERN_ANSWER_CONTEXT_K") {
            self.retrieval.answer_context_k = k;
        }
        if let Some(k) = parse_env::<usize>("LECTERN_ANSWER_CITATIONS") {
            self.retrieval.answer_citations = k;
        }
        if let Some(k) = parse_env::<usize>("LECTERN_FEEDBACK_CONTEXT_K") {
            self.retrieval.feedback_context_k = k;
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    if let Ok(value) = raw.trim().parse::<T>() {
        Some(value)
    } else {
        tracing::warn!("ignoring invalid {key} value: {raw}");
        None
    }
}
