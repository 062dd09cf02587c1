// Payload synthesis
//
// Turns sampled parameters into an OpenAI-style chat completion body.
// Lengths are counted in chars (Unicode scalar values), never bytes, so that
// corpus truncation cannot split a code point.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{PromptSource, RunConfig};
use crate::corpus::Corpus;

/// Lower bound for the sampled output token budget
pub const MIN_MAX_TOKENS: u32 = 1;
/// Lower bound for the sampled prompt length, applied before expansion
pub const MIN_PROMPT_LEN: usize = 10;
/// Filler repeated to build `random` prompts
pub const FILLER_TEXT: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ";
/// Sampling temperature sent with every request
pub const TEMPERATURE: u32 = 1;

/// Per-call parameters drawn from the configured distributions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampledRequestParams {
    /// Output token budget (≥ 1)
    pub max_tokens: u32,
    /// Prompt length in chars, after clamping and expansion
    pub prompt_len: usize,
}

impl SampledRequestParams {
    /// Draw token budget and prompt length independently
    pub fn draw<R: Rng + ?Sized>(config: &RunConfig, rng: &mut R) -> Self {
        let raw_tokens = config.max_tokens.sample(rng);
        let raw_prompt = config.prompt_len.sample(rng);
        Self::from_raw(raw_tokens, raw_prompt, config.chars_per_token)
    }

    /// Round, clamp and expand raw samples
    pub fn from_raw(raw_tokens: f64, raw_prompt: f64, chars_per_token: Option<u32>) -> Self {
        // `as` saturates, so huge or negative draws land on the clamps
        let max_tokens = (raw_tokens.round() as u32).max(MIN_MAX_TOKENS);
        let prompt_len = (raw_prompt.round() as usize).max(MIN_PROMPT_LEN);
        let prompt_len = match chars_per_token {
            Some(factor) => prompt_len.saturating_mul(factor as usize),
            None => prompt_len,
        };
        Self {
            max_tokens,
            prompt_len,
        }
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Request body POSTed to the inference endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: u32,
}

impl ChatRequest {
    /// The single user prompt of this request
    pub fn prompt(&self) -> &str {
        self.messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// Filler text of exactly `len` chars
pub fn filler_prompt(len: usize) -> String {
    let unit = FILLER_TEXT.chars().count();
    let repeats = len.div_ceil(unit);
    FILLER_TEXT.repeat(repeats).chars().take(len).collect()
}

/// Corpus entry truncated to at most `len` chars, never padded
pub fn truncate_prompt(entry: &str, len: usize) -> String {
    entry.chars().take(len).collect()
}

/// Prompt text for the configured source
pub fn generate_prompt<R: Rng + ?Sized>(
    source: PromptSource,
    corpus: &Corpus,
    len: usize,
    rng: &mut R,
) -> String {
    match source {
        PromptSource::Corpus => match corpus.choose(rng) {
            Some(entry) => truncate_prompt(entry, len),
            None => filler_prompt(len),
        },
        PromptSource::Random => filler_prompt(len),
    }
}

/// Assemble a request body from already drawn parameters
pub fn assemble<R: Rng + ?Sized>(
    config: &RunConfig,
    corpus: &Corpus,
    params: SampledRequestParams,
    rng: &mut R,
) -> ChatRequest {
    let content = generate_prompt(config.prompt_source, corpus, params.prompt_len, rng);
    ChatRequest {
        model: config.model.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content,
        }],
        max_tokens: params.max_tokens,
        temperature: TEMPERATURE,
    }
}

/// Sample parameters and build a request body
pub fn build_payload<R: Rng + ?Sized>(
    config: &RunConfig,
    corpus: &Corpus,
    rng: &mut R,
) -> ChatRequest {
    let params = SampledRequestParams::draw(config, rng);
    assemble(config, corpus, params, rng)
}
