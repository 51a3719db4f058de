pub const DEFAULT_CONFIG_PATH: &str = "config/bridge.toml";
pub const DEFAULT_ENV_PATH: &str = "config/.env";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;
pub const DEFAULT_SERVER_NAME: &str = "mcp";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that can use tools to help answer questions.";

/// Environment variable that overrides `llm.model` when set.
pub const MODEL_ENV_VAR: &str = "OPENAI_MODEL";
