use super::error::ConfigError;
use super::llm::LlmConfig;
use super::server::ServerConfig;
use std::path::Path;

/// Application configuration loaded from bridge.toml
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub system_prompt: Option<String>,
    pub max_tool_rounds: usize,
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::{
        DEFAULT_BASE_URL, DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_SYSTEM_PROMPT, MODEL_ENV_VAR,
    };
    use crate::config::loader::parse_config;
    use serial_test::serial;
    use std::env;
    use std::fs;

    const MINIMAL: &str = r#"
[llm]
model = "llama3.2"

[server]
command = "uvx"
args = ["mcp-server-fetch"]
"#;

    #[test]
    #[serial]
    fn minimal_config_fills_defaults() {
        unsafe {
            env::remove_var(MODEL_ENV_VAR);
        }
        let config = parse_config(MINIMAL, Path::new("inline.toml")).expect("parse");
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_tool_rounds, DEFAULT_MAX_TOOL_ROUNDS);
        assert_eq!(config.system_prompt.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(config.server.args, vec!["mcp-server-fetch"]);
    }

    #[test]
    #[serial]
    fn blank_system_prompt_disables_it() {
        let content = format!("system_prompt = \"\"\n{MINIMAL}");
        let config = parse_config(&content, Path::new("inline.toml")).expect("parse");
        assert!(config.system_prompt.is_none());
    }

    #[test]
    #[serial]
    fn model_env_var_overrides_file() {
        unsafe {
            env::set_var(MODEL_ENV_VAR, "gpt-4o");
        }
        let config = parse_config(MINIMAL, Path::new("inline.toml"));
        unsafe {
            env::remove_var(MODEL_ENV_VAR);
        }
        assert_eq!(config.expect("parse").llm.model, "gpt-4o");
    }

    #[test]
    #[serial]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bridge.toml");
        fs::write(
            &path,
            r#"
max_tool_rounds = 3

[llm]
model = "mistral"
base_url = "http://localhost:11434/v1"
temperature = 0.2
max_tokens = 512

[server]
name = "time"
command = "mcp-server-time"
"#,
        )
        .expect("write");

        let config = AppConfig::load(Some(&path)).expect("load");
        assert_eq!(config.max_tool_rounds, 3);
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.server.name, "time");
    }
}
