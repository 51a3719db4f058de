//! Message adapter - converts conversation history to the OpenAI wire format

use crate::types::ConversationMessage;
use serde_json::{Value, json};

pub struct MessageAdapter;

impl MessageAdapter {
    /// Returns `[{"role": "...", "content": "...", ...}]`, with assistant
    /// `tool_calls` and tool `tool_call_id` where present.
    pub fn to_openai_format(messages: &[ConversationMessage]) -> Vec<Value> {
        messages.iter().map(Self::to_openai_message).collect()
    }

    fn to_openai_message(message: &ConversationMessage) -> Value {
        let mut wire = json!({
            "role": message.role().as_str(),
            "content": message.content()
        });
        match message {
            ConversationMessage::Assistant { tool_calls, .. } if !tool_calls.is_empty() => {
                let calls: Vec<Value> = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.target_name,
                                "arguments": call.arguments_json
                            }
                        })
                    })
                    .collect();
                wire["tool_calls"] = Value::Array(calls);
            }
            ConversationMessage::Tool { tool_call_id, .. } => {
                wire["tool_call_id"] = json!(tool_call_id);
            }
            _ => {}
        }
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolCallRequest, ToolCallResult};

    #[test]
    fn conversion_preserves_roles_and_tool_fields() {
        let messages = vec![
            ConversationMessage::system("stay concise"),
            ConversationMessage::user("weather?"),
            ConversationMessage::assistant(
                "",
                vec![ToolCallRequest::new("call_1", "get_weather", r#"{"city":"Paris"}"#)],
            ),
            ConversationMessage::tool(ToolCallResult {
                id: "call_1".into(),
                output_text: "18".into(),
            }),
            ConversationMessage::assistant("It is 18.", Vec::new()),
        ];

        let wire = MessageAdapter::to_openai_format(&messages);
        let roles: Vec<_> = wire.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool", "assistant"]);

        assert_eq!(wire[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(wire[2]["tool_calls"][0]["type"], "function");
        assert_eq!(wire[2]["tool_calls"][0]["function"]["name"], "get_weather");
        assert_eq!(
            wire[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"city":"Paris"}"#
        );
        assert_eq!(wire[3]["tool_call_id"], "call_1");
        assert_eq!(wire[3]["content"], "18");
        assert!(wire[4].get("tool_calls").is_none());
    }
}
