use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

/// One entry of a conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool(result: ToolCallResult) -> Self {
        Self::Tool {
            tool_call_id: result.id,
            content: result.output_text,
        }
    }

    pub fn role(&self) -> MessageRole {
        match self {
            Self::System { .. } => MessageRole::System,
            Self::User { .. } => MessageRole::User,
            Self::Assistant { .. } => MessageRole::Assistant,
            Self::Tool { .. } => MessageRole::Tool,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => content,
        }
    }
}

/// A tool as advertised by the tool provider. Any field may be missing on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolDescriptor {
    pub name: Option<String>,
    pub description: Option<String>,
    pub input_schema: Option<Value>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            description: Some(description.into()),
            input_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// A model-issued tool call. `target_name` is the model-facing (sanitized) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub id: String,
    pub target_name: String,
    pub arguments_json: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        target_name: impl Into<String>,
        arguments_json: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            target_name: target_name.into(),
            arguments_json: arguments_json.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallResult {
    pub id: String,
    pub output_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

/// Result of a provider tool execution, classified by the provider adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResult {
    PlainText(String),
    StructuredBlocks(Vec<TextBlock>),
    Opaque(String),
}

impl ProviderResult {
    /// Collapses the result into the text handed back to the model.
    pub fn into_text(self) -> String {
        match self {
            ProviderResult::PlainText(text) => text,
            ProviderResult::StructuredBlocks(blocks) => blocks
                .into_iter()
                .map(|block| block.text)
                .collect::<Vec<_>>()
                .join(" "),
            ProviderResult::Opaque(repr) => repr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub is_tool_call: bool,
    pub stop_reason: String,
}
