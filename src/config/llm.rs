//! # Model endpoint configuration
//!
//! Settings for the OpenAI-compatible chat-completion endpoint.
//!
//! ```toml
//! [llm]
//! model = "llama3.2"
//! base_url = "http://localhost:11434/v1"
//! api_key = "OPENAI_API_KEY"
//! temperature = 0.7
//! max_tokens = 2000
//! ```
//!
//! `api_key` names the environment variable that holds the key, so secrets
//! stay out of the file.

use super::defaults::{DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use serde::Deserialize;
use std::env;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub model: String,
    /// Resolved key value, not the variable name.
    pub api_key: Option<String>,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct RawLlmConfig {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Resolve an API key from the environment variable named by `var_name`.
pub fn resolve_api_key(var_name: Option<&str>) -> Option<String> {
    let raw = var_name.map(str::trim)?;
    if raw.is_empty() {
        return None;
    }
    match env::var(raw) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        Ok(_) => None,
        Err(err) => {
            warn!(env_var = raw, %err, "API key environment variable is not set");
            None
        }
    }
}
