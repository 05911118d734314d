use std::sync::{Arc, Mutex};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::t5::{self, T5ForConditionalGeneration};
use serde::Deserialize;
use tokenizers::Tokenizer;

use super::loader::{ModelSource, load_tokenizer, read_config};
use crate::decoding::{DecodingConfig, beam_search, sample_sequence, truncate_prompt_tokens};
use crate::error::LlmError;
use crate::provider::GenerationProvider;

#[derive(Deserialize)]
struct SpecialTokens {
    eos_token_id: u32,
    pad_token_id: u32,
    #[serde(default)]
    decoder_start_token_id: Option<u32>,
}

/// Encoder-decoder (T5 family) text generator.
#[derive(Clone)]
pub struct T5Generator {
    // Forward passes mutate the attention cache, so calls are serialized.
    model: Arc<Mutex<T5ForConditionalGeneration>>,
    tokenizer: Arc<Tokenizer>,
    decoder_start_token_id: u32,
    eos_token_id: u32,
    device: Device,
}

impl std::fmt::Debug for T5Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("T5Generator")
            .field("decoder_start_token_id", &self.decoder_start_token_id)
            .field("eos_token_id", &self.eos_token_id)
            .field("device", &format!("{:?}", self.device))
            .finish_non_exhaustive()
    }
}

impl T5Generator {
    /// Load a T5 checkpoint with its tokenizer.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ModelLoad`] if the files cannot be fetched or parsed.
    pub fn load(source: &ModelSource, device: &Device) -> Result<Self, LlmError> {
        let files = source.fetch()?;

        let config_str = read_config(&files.config)?;
        let config: t5::Config = serde_json::from_str(&config_str)
            .map_err(|e| LlmError::ModelLoad(format!("invalid T5 config: {e}")))?;
        let special: SpecialTokens = serde_json::from_str(&config_str)
            .map_err(|e| LlmError::ModelLoad(format!("T5 config lacks special tokens: {e}")))?;

        let tokenizer = load_tokenizer(&files.tokenizer)?;

        // SAFETY: the safetensors file is not modified while the VarBuilder maps it
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DType::F32, device)
                .map_err(|e| LlmError::ModelLoad(format!("failed to map T5 weights: {e}")))?
        };
        let model = T5ForConditionalGeneration::load(vb, &config)
            .map_err(|e| LlmError::ModelLoad(format!("failed to build T5 model: {e}")))?;

        tracing::info!(%source, "generation model loaded");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            tokenizer: Arc::new(tokenizer),
            decoder_start_token_id: special
                .decoder_start_token_id
                .unwrap_or(special.pad_token_id),
            eos_token_id: special.eos_token_id,
            device: device.clone(),
        })
    }

    fn generate_sync(&self, prompt: &str, config: &DecodingConfig) -> Result<String, LlmError> {
        let encoding = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| LlmError::Inference(format!("tokenizer encode failed: {e}")))?;
        let input_tokens =
            truncate_prompt_tokens(encoding.get_ids(), config.max_input_tokens, self.eos_token_id);

        let mut model = self
            .model
            .lock()
            .map_err(|e| LlmError::Inference(format!("model lock poisoned: {e}")))?;
        model.clear_kv_cache();
        let input_ids = Tensor::new(input_tokens.as_slice(), &self.device)?.unsqueeze(0)?;
        let encoder_output = model.encode(&input_ids)?;

        let device = self.device.clone();
        let mut expanded: Option<Tensor> = None;
        // All beams go through the decoder as one [beams, prefix_len] batch.
        // The full prefix is re-decoded each step, so the cache must start empty.
        let mut step = |prefixes: &[Vec<u32>]| -> Result<Vec<Vec<f32>>, LlmError> {
            let batch = prefixes.len();
            let prefix_len = prefixes.first().map_or(0, Vec::len);
            if prefixes.iter().any(|p| p.len() != prefix_len) {
                return Err(LlmError::Inference("beam prefixes differ in length".into()));
            }
            let encoder_batch = match expanded.take() {
                Some(t) if t.dims().first() == Some(&batch) => t,
                _ => {
                    let (_, seq_len, hidden) = encoder_output.dims3()?;
                    encoder_output
                        .broadcast_as((batch, seq_len, hidden))?
                        .contiguous()?
                }
            };
            expanded = Some(encoder_batch.clone());

            model.clear_kv_cache();
            let decoder_ids = Tensor::from_vec(prefixes.concat(), (batch, prefix_len), &device)?;
            let logits = model
                .decode(&decoder_ids, &encoder_batch)?
                .to_dtype(DType::F32)?;
            Ok(logits.to_vec2::<f32>()?)
        };

        let tokens = if config.deterministic {
            beam_search(
                &mut step,
                self.decoder_start_token_id,
                self.eos_token_id,
                config,
            )?
        } else {
            let mut single = |prefix: &[u32]| -> Result<Vec<f32>, LlmError> {
                step(&[prefix.to_vec()])?
                    .pop()
                    .ok_or_else(|| LlmError::Inference("decoder returned no logits".into()))
            };
            let mut processor = LogitsProcessor::from_sampling(
                config.seed,
                Sampling::All {
                    temperature: config.temperature,
                },
            );
            let mut sample = |logits: &[f32]| -> Result<u32, LlmError> {
                let row = Tensor::new(logits, &Device::Cpu)?;
                Ok(processor.sample(&row)?)
            };
            sample_sequence(
                &mut single,
                &mut sample,
                self.decoder_start_token_id,
                self.eos_token_id,
                config,
            )?
        };

        tracing::debug!(
            prompt_tokens = input_tokens.len(),
            tokens_generated = tokens.len(),
            beams = config.beam_count,
            "generation finished"
        );
        self.tokenizer
            .decode(&tokens, true)
            .map_err(|e| LlmError::Inference(format!("tokenizer decode failed: {e}")))
    }
}

impl GenerationProvider for T5Generator {
    async fn generate(&self, prompt: &str, config: &DecodingConfig) -> Result<String, LlmError> {
        let provider = self.clone();
        let prompt = prompt.to_owned();
        let config = config.clone();
        tokio::task::spawn_blocking(move || provider.generate_sync(&prompt, &config))
            .await
            .map_err(|e| LlmError::Inference(format!("generation task failed: {e}")))?
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "candle-t5"
    }
}
