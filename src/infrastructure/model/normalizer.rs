//! Uniform view over a raw chat completion.

use super::types::{ModelError, RawCompletion};
use crate::types::{NormalizedResponse, ToolCallRequest};

/// `finish_reason` value that marks a tool-call turn.
pub const TOOL_CALLS_FINISH_REASON: &str = "tool_calls";

/// Reads the first choice of `completion`. `is_tool_call` depends only on
/// the finish reason, never on whether the message also carries text.
pub fn normalize(completion: &RawCompletion) -> Result<NormalizedResponse, ModelError> {
    let choice = completion.choices.first().ok_or(ModelError::EmptyCompletion)?;
    let stop_reason = choice.finish_reason.clone().unwrap_or_default();
    let tool_calls = choice
        .message
        .tool_calls
        .iter()
        .flatten()
        .map(|call| ToolCallRequest {
            id: call.id.clone(),
            target_name: call.function.name.clone(),
            arguments_json: call.function.arguments.clone(),
        })
        .collect();

    Ok(NormalizedResponse {
        content: choice.message.content.clone().unwrap_or_default(),
        tool_calls,
        is_tool_call: stop_reason == TOOL_CALLS_FINISH_REASON,
        stop_reason,
    })
}
