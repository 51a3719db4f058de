//! Model traits

use super::types::{CompletionRequest, ModelError, RawCompletion};
use async_trait::async_trait;

/// A chat-completion endpoint with function calling.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<RawCompletion, ModelError>;
}
