use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mcp-llm-bridge",
    version,
    about = "Let an OpenAI-compatible model call tools served by an MCP server"
)]
pub struct Cli {
    /// Configuration file (defaults to config/bridge.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// System prompt; an empty string disables it
    #[arg(long)]
    pub system: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub base_url: Option<String>,
    #[arg(long)]
    pub max_tool_rounds: Option<usize>,
    /// Answer this prompt and exit instead of starting the interactive loop
    #[arg()]
    pub prompt: Vec<String>,
}

impl Cli {
    pub fn one_shot_prompt(&self) -> Option<String> {
        let joined = self.prompt.join(" ");
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}
