use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tokenizers::{Tokenizer, TruncationParams};

use super::loader::{ModelSource, load_tokenizer, read_config};
use crate::error::LlmError;
use crate::provider::EmbeddingProvider;

#[derive(Deserialize)]
struct HiddenSize {
    hidden_size: usize,
}

#[derive(Clone)]
pub struct BertEmbedder {
    model: Arc<BertModel>,
    tokenizer: Arc<Tokenizer>,
    dimension: usize,
    device: Device,
}

impl std::fmt::Debug for BertEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertEmbedder")
            .field("dimension", &self.dimension)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl BertEmbedder {
    /// Load a BERT sentence-embedding model. Inputs longer than `max_tokens`
    /// are truncated before the forward pass.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ModelLoad`] if the files cannot be fetched or parsed.
    pub fn load(source: &ModelSource, max_tokens: usize, device: &Device) -> Result<Self, LlmError> {
        let files = source.fetch()?;

        let config_str = read_config(&files.config)?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| LlmError::ModelLoad(format!("invalid BERT config: {e}")))?;
        let HiddenSize { hidden_size } = serde_json::from_str(&config_str)
            .map_err(|e| LlmError::ModelLoad(format!("BERT config lacks hidden_size: {e}")))?;

        let mut tokenizer = load_tokenizer(&files.tokenizer)?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                ..TruncationParams::default()
            }))
            .map_err(|e| LlmError::ModelLoad(format!("failed to configure truncation: {e}")))?;

        // SAFETY: the safetensors file is not modified while the VarBuilder maps it
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DType::F32, device)
                .map_err(|e| LlmError::ModelLoad(format!("failed to map BERT weights: {e}")))?
        };
        let model = BertModel::load(vb, &config)
            .map_err(|e| LlmError::ModelLoad(format!("failed to build BERT model: {e}")))?;

        tracing::info!(%source, dimension = hidden_size, "embedding model loaded");
        Ok(Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            dimension: hidden_size,
            device: device.clone(),
        })
    }

    /// Mean-pooled, L2-normalized embedding of `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization or the model forward pass fails.
    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| LlmError::Inference(format!("tokenizer encode failed: {e}")))?;

        let token_ids = encoding.get_ids();
        let token_type_ids: Vec<u32> = vec![0; token_ids.len()];

        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(token_type_ids.as_slice(), &self.device)?.unsqueeze(0)?;

        let embeddings = self.model.forward(&input_ids, &token_type_ids, None)?;

        let seq_len = embeddings.dim(1)?;
        let sum = embeddings.sum(1)?;
        let mean_pooled = (sum
            / f64::from(
                u32::try_from(seq_len)
                    .map_err(|e| LlmError::Inference(format!("sequence length overflow: {e}")))?,
            ))?;

        let norm = mean_pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = mean_pooled.broadcast_div(&norm)?.squeeze(0)?;

        normalized.to_vec1::<f32>().map_err(LlmError::Candle)
    }
}

impl EmbeddingProvider for BertEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self.clone();
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || model.embed_sync(&text))
            .await
            .map_err(|e| LlmError::Inference(format!("embedding task failed: {e}")))?
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "candle-bert"
    }
}
