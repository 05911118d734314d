use std::path::PathBuf;

use lectern_llm::DecodingConfig;
use lectern_memory::document::DEFAULT_MAX_FILE_SIZE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
}

fn default_embedding_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".into()
}

fn default_generation_repo() -> String {
    "google/flan-t5-base".into()
}

fn default_device() -> String {
    "cpu".into()
}

fn default_embed_max_tokens() -> usize {
    256
}

/// Model locations: a hub repo id or a local directory with the model files.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    #[serde(default = "default_embedding_repo")]
    pub embedding_repo: String,
    #[serde(default = "default_generation_repo")]
    pub generation_repo: String,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_embed_max_tokens")]
    pub embed_max_tokens: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            embedding_repo: default_embedding_repo(),
            generation_repo: default_generation_repo(),
            device: default_device(),
            embed_max_tokens: default_embed_max_tokens(),
        }
    }
}

fn default_answer_context_k() -> usize {
    5
}

fn default_answer_citations() -> usize {
    3
}

fn default_feedback_context_k() -> usize {
    3
}

/// How many pages feed each workflow. Context breadth and citation count are
/// independent knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_answer_context_k")]
    pub answer_context_k: usize,
    #[serde(default = "default_answer_citations")]
    pub answer_citations: usize,
    #[serde(default = "default_feedback_context_k")]
    pub feedback_context_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            answer_context_k: default_answer_context_k(),
            answer_citations: default_answer_citations(),
            feedback_context_k: default_feedback_context_k(),
        }
    }
}

#[must_use]
pub fn default_answer_decoding() -> DecodingConfig {
    DecodingConfig {
        max_input_tokens: 1024,
        max_output_tokens: 300,
        min_output_tokens: 50,
        beam_count: 5,
        temperature: 0.7,
        deterministic: true,
        no_repeat_ngram_size: 3,
        seed: 42,
    }
}

#[must_use]
pub fn default_feedback_decoding() -> DecodingConfig {
    DecodingConfig {
        max_output_tokens: 350,
        min_output_tokens: 80,
        ..default_answer_decoding()
    }
}

/// Partial decoding table; unset fields keep the workflow's defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DecodingOverrides {
    max_input_tokens: Option<usize>,
    max_output_tokens: Option<usize>,
    min_output_tokens: Option<usize>,
    beam_count: Option<usize>,
    temperature: Option<f64>,
    deterministic: Option<bool>,
    no_repeat_ngram_size: Option<usize>,
    seed: Option<u64>,
}

impl DecodingOverrides {
    fn apply(self, base: DecodingConfig) -> DecodingConfig {
        DecodingConfig {
            max_input_tokens: self.max_input_tokens.unwrap_or(base.max_input_tokens),
            max_output_tokens: self.max_output_tokens.unwrap_or(base.max_output_tokens),
            min_output_tokens: self.min_output_tokens.unwrap_or(base.min_output_tokens),
            beam_count: self.beam_count.unwrap_or(base.beam_count),
            temperature: self.temperature.unwrap_or(base.temperature),
            deterministic: self.deterministic.unwrap_or(base.deterministic),
            no_repeat_ngram_size: self.no_repeat_ngram_size.unwrap_or(base.no_repeat_ngram_size),
            seed: self.seed.unwrap_or(base.seed),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawGenerationConfig {
    #[serde(default)]
    answer: DecodingOverrides,
    #[serde(default)]
    feedback: DecodingOverrides,
}

/// Decoding controls for the answer and feedback workflows.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    pub answer: DecodingConfig,
    pub feedback: DecodingConfig,
}

impl GenerationConfig {
    fn from_raw(raw: RawGenerationConfig) -> Self {
        Self {
            answer: raw.answer.apply(default_answer_decoding()),
            feedback: raw.feedback.apply(default_feedback_decoding()),
        }
    }
}

impl<'de> Deserialize<'de> for GenerationConfig {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawGenerationConfig::deserialize(deserializer).map(Self::from_raw)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from_raw(RawGenerationConfig::default())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentsConfig {
    /// Folder scanned for `*.pdf` slide decks.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_file_size: default_max_file_size(),
        }
    }
}
