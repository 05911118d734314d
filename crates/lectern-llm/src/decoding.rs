//! Backend-independent decoding: prompt truncation, n-gram blocking, beam search
//! and sampled generation over an abstract next-token step function.
//!
//! A step function receives full decoder prefixes (starting with the decoder
//! start token) and returns raw logits over the vocabulary for the next
//! position. Beam search hands it every live beam at once; sampling hands it a
//! single prefix. Models plug in by wrapping their forward pass in such a
//! closure.

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Decoding controls for a single generation call.
///
/// Token counts refer to generated tokens and exclude the decoder start token
/// and the end-of-sequence marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodingConfig {
    /// Prompt tokens beyond this are dropped from the end of the prompt.
    pub max_input_tokens: usize,
    pub max_output_tokens: usize,
    /// End-of-sequence is suppressed until this many tokens exist.
    pub min_output_tokens: usize,
    pub beam_count: usize,
    /// Sampling temperature. Ignored when `deterministic` is set.
    pub temperature: f64,
    /// Beam search when set, seeded sampling otherwise.
    pub deterministic: bool,
    /// Forbid repeating any n-gram of this size. `0` disables the check.
    pub no_repeat_ngram_size: usize,
    pub seed: u64,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            max_input_tokens: 1024,
            max_output_tokens: 256,
            min_output_tokens: 0,
            beam_count: 1,
            temperature: 1.0,
            deterministic: true,
            no_repeat_ngram_size: 0,
            seed: 42,
        }
    }
}

impl DecodingConfig {
    /// Check the config for values that make generation impossible.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_input_tokens == 0 {
            return Err("max_input_tokens must be greater than zero".into());
        }
        if self.max_output_tokens == 0 {
            return Err("max_output_tokens must be greater than zero".into());
        }
        if self.min_output_tokens > self.max_output_tokens {
            return Err(format!(
                "min_output_tokens ({}) exceeds max_output_tokens ({})",
                self.min_output_tokens, self.max_output_tokens
            ));
        }
        if self.beam_count == 0 {
            return Err("beam_count must be greater than zero".into());
        }
        if !self.deterministic && self.temperature <= 0.0 {
            return Err("temperature must be positive when sampling".into());
        }
        Ok(())
    }
}

/// Keep the leading prompt tokens so that the result, including a trailing
/// `eos_token_id`, fits in `max_input_tokens`.
#[must_use]
pub fn truncate_prompt_tokens(tokens: &[u32], max_input_tokens: usize, eos_token_id: u32) -> Vec<u32> {
    let budget = max_input_tokens.saturating_sub(1);
    let body = tokens.strip_suffix(&[eos_token_id]).unwrap_or(tokens);
    let keep = body.len().min(budget);
    if keep < body.len() {
        tracing::debug!(
            prompt_tokens = body.len(),
            kept = keep,
            "prompt truncated to input budget"
        );
    }
    let mut out = Vec::with_capacity(keep + 1);
    out.extend_from_slice(&body[..keep]);
    out.push(eos_token_id);
    out
}

/// Tokens that would complete an n-gram of size `n` already present in `sequence`.
#[must_use]
pub fn banned_ngram_tokens(sequence: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || sequence.len() + 1 < n {
        return Vec::new();
    }
    if n == 1 {
        let mut seen = sequence.to_vec();
        seen.sort_unstable();
        seen.dedup();
        return seen;
    }
    let tail = &sequence[sequence.len() + 1 - n..];
    let mut banned: Vec<u32> = sequence
        .windows(n)
        .filter(|w| &w[..n - 1] == tail)
        .map(|w| w[n - 1])
        .collect();
    banned.sort_unstable();
    banned.dedup();
    banned
}

fn log_softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![f64::NEG_INFINITY; logits.len()];
    }
    let max = f64::from(max);
    let sum: f64 = logits.iter().map(|&v| (f64::from(v) - max).exp()).sum();
    let log_sum = sum.ln();
    logits
        .iter()
        .map(|&v| f64::from(v) - max - log_sum)
        .collect()
}

/// Indices of the `k` largest finite values, best first; equal values keep index order.
fn top_k_finite(values: &[f64], k: usize) -> Vec<(usize, f64)> {
    let mut top: Vec<(usize, f64)> = Vec::with_capacity(k + 1);
    for (idx, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        if top.len() == k && top.last().is_some_and(|&(_, worst)| value <= worst) {
            continue;
        }
        let pos = top.partition_point(|&(_, v)| v >= value);
        top.insert(pos, (idx, value));
        top.truncate(k);
    }
    top
}

/// Apply the length and repetition constraints to a logits row in place.
fn constrain_logits(
    logits: &mut [f32],
    prefix: &[u32],
    generated_len: usize,
    eos_token_id: u32,
    config: &DecodingConfig,
) {
    if generated_len < config.min_output_tokens
        && let Some(eos) = logits.get_mut(eos_token_id as usize)
    {
        *eos = f32::NEG_INFINITY;
    }
    for token in banned_ngram_tokens(prefix, config.no_repeat_ngram_size) {
        if let Some(slot) = logits.get_mut(token as usize) {
            *slot = f32::NEG_INFINITY;
        }
    }
}

#[derive(Debug, Clone)]
struct Beam {
    tokens: Vec<u32>,
    log_prob: f64,
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    score: f64,
}

#[allow(clippy::cast_precision_loss)]
fn length_normalized(log_prob: f64, len: usize) -> f64 {
    log_prob / len.max(1) as f64
}

/// Beam search over `step`.
///
/// `step` receives every live beam's decoder prefix (start token included, all
/// the same length) and returns one logits row per prefix, in order.
///
/// Returns the generated token ids of the best hypothesis, without the start
/// token and without the end-of-sequence marker. Stops once `beam_count`
/// hypotheses have finished or `max_output_tokens` is reached; unfinished
/// beams then compete with finished ones on length-normalized log-probability.
///
/// # Errors
///
/// Propagates any error returned by `step`, and fails with
/// [`LlmError::Inference`] when it returns the wrong number of rows.
pub fn beam_search<F>(
    step: &mut F,
    decoder_start_token_id: u32,
    eos_token_id: u32,
    config: &DecodingConfig,
) -> Result<Vec<u32>, LlmError>
where
    F: FnMut(&[Vec<u32>]) -> Result<Vec<Vec<f32>>, LlmError>,
{
    let num_beams = config.beam_count.max(1);
    let mut beams = vec![Beam {
        tokens: Vec::new(),
        log_prob: 0.0,
    }];
    let mut finished: Vec<Hypothesis> = Vec::new();

    for _ in 0..config.max_output_tokens {
        let prefixes: Vec<Vec<u32>> = beams
            .iter()
            .map(|beam| {
                let mut prefix = Vec::with_capacity(beam.tokens.len() + 1);
                prefix.push(decoder_start_token_id);
                prefix.extend_from_slice(&beam.tokens);
                prefix
            })
            .collect();
        let rows = step(&prefixes)?;
        if rows.len() != prefixes.len() {
            return Err(LlmError::Inference(format!(
                "decoder returned {} logits rows for {} beams",
                rows.len(),
                prefixes.len()
            )));
        }

        let mut candidates: Vec<(f64, usize, u32)> = Vec::new();
        for (beam_idx, (mut logits, prefix)) in rows.into_iter().zip(&prefixes).enumerate() {
            let beam = &beams[beam_idx];
            constrain_logits(
                &mut logits,
                prefix,
                beam.tokens.len(),
                eos_token_id,
                config,
            );
            let log_probs = log_softmax(&logits);
            for (token, lp) in top_k_finite(&log_probs, 2 * num_beams) {
                #[allow(clippy::cast_possible_truncation)]
                candidates.push((beam.log_prob + lp, beam_idx, token as u32));
            }
        }
        if candidates.is_empty() {
            break;
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut next = Vec::with_capacity(num_beams);
        for (rank, &(log_prob, beam_idx, token)) in candidates.iter().enumerate() {
            let parent = &beams[beam_idx];
            if token == eos_token_id {
                if rank < num_beams {
                    finished.push(Hypothesis {
                        tokens: parent.tokens.clone(),
                        score: length_normalized(log_prob, parent.tokens.len() + 1),
                    });
                }
            } else {
                let mut tokens = parent.tokens.clone();
                tokens.push(token);
                next.push(Beam { tokens, log_prob });
            }
            if next.len() == num_beams {
                break;
            }
        }

        if finished.len() >= num_beams || next.is_empty() {
            beams = next;
            break;
        }
        beams = next;
    }

    if finished.len() < num_beams {
        finished.extend(beams.into_iter().map(|b| Hypothesis {
            score: length_normalized(b.log_prob, b.tokens.len()),
            tokens: b.tokens,
        }));
    }

    let best = finished
        .into_iter()
        .reduce(|best, h| if h.score > best.score { h } else { best })
        .map(|h| h.tokens)
        .unwrap_or_default();
    Ok(best)
}

/// Single-sequence generation where `sample` picks each token from the
/// constrained logits row.
///
/// # Errors
///
/// Propagates any error returned by `step` or `sample`.
pub fn sample_sequence<F, S>(
    step: &mut F,
    sample: &mut S,
    decoder_start_token_id: u32,
    eos_token_id: u32,
    config: &DecodingConfig,
) -> Result<Vec<u32>, LlmError>
where
    F: FnMut(&[u32]) -> Result<Vec<f32>, LlmError>,
    S: FnMut(&[f32]) -> Result<u32, LlmError>,
{
    let mut prefix = vec![decoder_start_token_id];
    for generated in 0..config.max_output_tokens {
        let mut logits = step(&prefix)?;
        constrain_logits(&mut logits, &prefix, generated, eos_token_id, config);
        if logits.iter().all(|v| !v.is_finite()) {
            break;
        }
        let token = sample(&logits)?;
        if token == eos_token_id {
            break;
        }
        prefix.push(token);
    }
    prefix.remove(0);
    Ok(prefix)
}
