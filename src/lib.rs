pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::bridge::{BridgeError, BridgeManager, BridgeOptions, McpLlmBridge};
pub use application::{catalog, invoker, stdio, tooling};
pub use cli::Cli;
pub use config::AppConfig;
pub use domain::types;
pub use infrastructure::model;

use crate::config::ConfigError;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Stdio(#[from] stdio::StdioError),
}

/// Applies command-line overrides on top of the loaded configuration.
pub fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(system) = &cli.system {
        config.system_prompt = (!system.trim().is_empty()).then(|| system.clone());
    }
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.llm.base_url = base_url.clone();
    }
    if let Some(rounds) = cli.max_tool_rounds {
        config.max_tool_rounds = rounds;
    }
}

/// Loads configuration, opens the bridge, and answers either the prompt
/// given on the command line or prompts read interactively.
pub async fn run(cli: Cli) -> Result<(), RunError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    debug!(
        model = %config.llm.model,
        base_url = %config.llm.base_url,
        server = %config.server.name,
        "Configuration resolved"
    );

    let mut manager = BridgeManager::from_config(&config).await?;
    info!(
        tools = manager.bridge().tools().functions.len(),
        "Bridge ready"
    );

    let outcome = match cli.one_shot_prompt() {
        Some(prompt) => {
            let response = manager.bridge_mut().process_message(&prompt).await;
            println!("{response}");
            Ok(())
        }
        None => stdio::run(manager.bridge_mut()).await,
    };

    manager.close().await;
    info!("Bridge closed");
    outcome.map_err(RunError::from)
}
