pub mod app;
pub mod defaults;
pub mod error;
pub mod llm;
pub mod loader;
pub mod server;

pub use app::AppConfig;
pub use defaults::DEFAULT_CONFIG_PATH;
pub use error::ConfigError;
pub use llm::LlmConfig;
pub use server::ServerConfig;
