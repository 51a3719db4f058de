use super::app::AppConfig;
use super::defaults::{
    DEFAULT_BASE_URL, DEFAULT_CONFIG_PATH, DEFAULT_ENV_PATH, DEFAULT_MAX_TOKENS,
    DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE, MODEL_ENV_VAR,
};
use super::error::ConfigError;
use super::llm::{LlmConfig, RawLlmConfig, resolve_api_key};
use super::server::{RawServer, ServerConfig};
use dotenvy::{dotenv, from_filename};
use serde::Deserialize;
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Once;
use tracing::debug;

static ENV_LOADER: Once = Once::new();

/// Raw configuration structure for deserialization from TOML
#[derive(Debug, Deserialize, Default)]
pub(super) struct RawConfig {
    pub system_prompt: Option<String>,
    pub max_tool_rounds: Option<usize>,
    #[serde(default)]
    pub llm: RawLlmConfig,
    pub server: Option<RawServer>,
}

/// Ensures environment variables are loaded from `config/.env` and `./.env`.
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename(DEFAULT_ENV_PATH);
        let _ = dotenv();
    });
}

/// Load and validate configuration from a file path
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    read_config(config_path)
}

/// Parse configuration from TOML text without touching the filesystem.
pub fn parse_config(content: &str, origin: &Path) -> Result<AppConfig, ConfigError> {
    let parsed: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    validate_and_build(parsed)
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading bridge configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    parse_config(&content, path)
}

fn validate_and_build(parsed: RawConfig) -> Result<AppConfig, ConfigError> {
    let model = env::var(MODEL_ENV_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or(parsed.llm.model)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingModel)?;

    let server = ServerConfig::try_from(parsed.server.ok_or(ConfigError::MissingServer)?)?;

    let llm = LlmConfig {
        model,
        api_key: resolve_api_key(parsed.llm.api_key.as_deref()),
        base_url: parsed
            .llm
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        temperature: parsed.llm.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        max_tokens: parsed.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    };

    let system_prompt = match parsed.system_prompt {
        Some(prompt) if prompt.trim().is_empty() => None,
        Some(prompt) => Some(prompt),
        None => Some(DEFAULT_SYSTEM_PROMPT.to_string()),
    };

    Ok(AppConfig {
        llm,
        server,
        system_prompt,
        max_tool_rounds: parsed.max_tool_rounds.unwrap_or(DEFAULT_MAX_TOOL_ROUNDS),
    })
}
