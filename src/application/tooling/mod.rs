mod error;
mod interface;
mod process;

pub use error::ToolInvokeError;
pub use interface::ToolProvider;
pub use process::McpProcess;
