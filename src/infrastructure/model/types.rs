//! Model types - request, raw completion, and error types

use crate::application::catalog::FunctionTool;
use crate::types::ConversationMessage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One chat-completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ConversationMessage>,
    /// `None` when no tools are offered; the field is then left off the wire.
    pub tools: Option<Vec<FunctionTool>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Chat completion as returned by an OpenAI-compatible endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCompletion {
    #[serde(default)]
    pub choices: Vec<RawChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChoice {
    #[serde(default)]
    pub message: RawMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<RawToolCall>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawToolCall {
    pub id: String,
    pub function: RawFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl RawCompletion {
    /// Single-choice completion with a text answer.
    pub fn text(content: impl Into<String>, finish_reason: &str) -> Self {
        Self {
            choices: vec![RawChoice {
                message: RawMessage {
                    content: Some(content.into()),
                    tool_calls: None,
                },
                finish_reason: Some(finish_reason.to_string()),
            }],
        }
    }

    /// Single-choice completion requesting the given `(id, name, arguments)` calls.
    pub fn tool_calls(calls: &[(&str, &str, &str)]) -> Self {
        Self {
            choices: vec![RawChoice {
                message: RawMessage {
                    content: None,
                    tool_calls: Some(
                        calls
                            .iter()
                            .map(|(id, name, arguments)| RawToolCall {
                                id: id.to_string(),
                                function: RawFunctionCall {
                                    name: name.to_string(),
                                    arguments: arguments.to_string(),
                                },
                            })
                            .collect(),
                    ),
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
        }
    }
}

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("network error calling '{endpoint}': {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("model endpoint '{endpoint}' returned invalid response: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
    #[error("model returned a completion without choices")]
    EmptyCompletion,
}

impl ModelError {
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn invalid_response(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}
