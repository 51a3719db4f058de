use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value};

use super::error::ToolInvokeError;
use crate::types::{ProviderResult, ToolDescriptor};

/// The four operations the bridge needs from a tool provider.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn connect(&self) -> Result<(), ToolInvokeError>;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: JsonMap<String, Value>,
    ) -> Result<ProviderResult, ToolInvokeError>;

    /// Releases the connection. Safe to call more than once.
    async fn disconnect(&self);
}
