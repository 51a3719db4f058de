use crate::application::catalog::ToolNameMapping;
use crate::application::tooling::{ToolInvokeError, ToolProvider};
use crate::types::{ToolCallRequest, ToolCallResult};
use serde_json::{Map as JsonMap, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, Span, debug, error, info_span};

/// Why a single tool call produced error text instead of output.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error(transparent)]
    Provider(#[from] ToolInvokeError),
}

/// Executes model-issued tool calls against the provider.
///
/// Every failure is folded into the returned [`ToolCallResult`] as
/// `"Error: <message>"` so one bad call never aborts a batch.
pub struct ToolInvoker<T: ToolProvider + ?Sized> {
    provider: Arc<T>,
    mapping: ToolNameMapping,
    span: Span,
}

impl<T: ToolProvider + ?Sized> ToolInvoker<T> {
    pub fn new(provider: Arc<T>, mapping: ToolNameMapping) -> Self {
        Self::with_span(provider, mapping, info_span!("invoker"))
    }

    pub fn with_span(provider: Arc<T>, mapping: ToolNameMapping, span: Span) -> Self {
        Self {
            provider,
            mapping,
            span,
        }
    }

    pub async fn invoke(&self, call: &ToolCallRequest) -> ToolCallResult {
        let span = self.span.clone();
        async {
            let output_text = match self.try_invoke(call).await {
                Ok(text) => text,
                Err(err) => {
                    error!(
                        tool = call.target_name.as_str(),
                        call_id = call.id.as_str(),
                        %err,
                        "Tool execution failed"
                    );
                    format!("Error: {err}")
                }
            };
            debug!(
                call_id = call.id.as_str(),
                output = output_text.as_str(),
                "Formatted tool output"
            );
            ToolCallResult {
                id: call.id.clone(),
                output_text,
            }
        }
        .instrument(span)
        .await
    }

    /// Runs the calls one after another and returns one result per call, in order.
    pub async fn invoke_all(&self, calls: &[ToolCallRequest]) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.invoke(call).await);
        }
        results
    }

    async fn try_invoke(&self, call: &ToolCallRequest) -> Result<String, InvokeError> {
        let provider_name = self
            .mapping
            .resolve(&call.target_name)
            .ok_or_else(|| InvokeError::UnknownTool(call.target_name.clone()))?;
        let arguments = parse_arguments(&call.target_name, &call.arguments_json)?;
        debug!(tool = provider_name, ?arguments, "Dispatching tool call to provider");

        let result = self.provider.call_tool(provider_name, arguments).await?;
        Ok(result.into_text())
    }
}

/// Blank argument strings count as an empty object; anything else must be a JSON object.
fn parse_arguments(tool: &str, raw: &str) -> Result<JsonMap<String, Value>, InvokeError> {
    if raw.trim().is_empty() {
        return Ok(JsonMap::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(InvokeError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("expected a JSON object, got {other}"),
        }),
        Err(err) => Err(InvokeError::InvalidArguments {
            tool: tool.to_string(),
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::catalog::ToolCatalogAdapter;
    use crate::types::{ProviderResult, TextBlock, ToolDescriptor};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    struct StubProvider {
        result: Result<ProviderResult, String>,
        calls: Mutex<Vec<(String, JsonMap<String, Value>)>>,
    }

    impl StubProvider {
        fn returning(result: ProviderResult) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(result),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Err(message.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ToolProvider for StubProvider {
        async fn connect(&self) -> Result<(), ToolInvokeError> {
            Ok(())
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
            Ok(Vec::new())
        }

        async fn call_tool(
            &self,
            name: &str,
            arguments: JsonMap<String, Value>,
        ) -> Result<ProviderResult, ToolInvokeError> {
            self.calls.lock().await.push((name.to_string(), arguments));
            self.result.clone().map_err(|message| ToolInvokeError::Transport {
                server: "stub".into(),
                message,
            })
        }

        async fn disconnect(&self) {}
    }

    fn mapping() -> ToolNameMapping {
        ToolCatalogAdapter::default()
            .build_catalog(&[
                ToolDescriptor::new("Fetch Url", "Fetches a URL"),
                ToolDescriptor::new("get-weather", "Weather"),
            ])
            .mapping
    }

    #[tokio::test]
    async fn resolves_sanitized_name_and_passes_arguments() {
        let provider = StubProvider::returning(ProviderResult::PlainText("<html>".into()));
        let invoker = ToolInvoker::new(provider.clone(), mapping());

        let result = invoker
            .invoke(&ToolCallRequest::new(
                "call_1",
                "fetch_url",
                r#"{"url":"https://example.com"}"#,
            ))
            .await;

        assert_eq!(result.id, "call_1");
        assert_eq!(result.output_text, "<html>");
        let calls = provider.calls.lock().await;
        assert_eq!(calls[0].0, "Fetch Url");
        assert_eq!(calls[0].1.get("url"), Some(&json!("https://example.com")));
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_text() {
        let provider = StubProvider::returning(ProviderResult::PlainText("unused".into()));
        let invoker = ToolInvoker::new(provider.clone(), mapping());

        let result = invoker
            .invoke(&ToolCallRequest::new("call_9", "launch_rockets", "{}"))
            .await;

        assert_eq!(result.id, "call_9");
        assert!(result.output_text.contains("Unknown tool"));
        assert!(result.output_text.contains("launch_rockets"));
        assert!(provider.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_arguments_yield_error_text() {
        let provider = StubProvider::returning(ProviderResult::PlainText("unused".into()));
        let invoker = ToolInvoker::new(provider.clone(), mapping());

        let broken = invoker
            .invoke(&ToolCallRequest::new("a", "fetch_url", "{not json"))
            .await;
        let not_object = invoker
            .invoke(&ToolCallRequest::new("b", "fetch_url", "[1, 2]"))
            .await;

        assert!(broken.output_text.starts_with("Error: invalid arguments"));
        assert!(not_object.output_text.contains("expected a JSON object"));
        assert!(provider.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn blank_arguments_are_an_empty_object() {
        let provider = StubProvider::returning(ProviderResult::PlainText("ok".into()));
        let invoker = ToolInvoker::new(provider.clone(), mapping());

        let result = invoker
            .invoke(&ToolCallRequest::new("a", "get_weather", ""))
            .await;

        assert_eq!(result.output_text, "ok");
        assert!(provider.calls.lock().await[0].1.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_becomes_error_prefix() {
        let provider = StubProvider::failing("connection reset");
        let invoker = ToolInvoker::new(provider, mapping());

        let result = invoker
            .invoke(&ToolCallRequest::new("a", "get_weather", r#"{"city":"Paris"}"#))
            .await;

        assert!(result.output_text.starts_with("Error: "));
        assert!(result.output_text.contains("connection reset"));
    }

    #[tokio::test]
    async fn structured_blocks_are_joined() {
        let provider = StubProvider::returning(ProviderResult::StructuredBlocks(vec![
            TextBlock {
                text: "Sunny,".into(),
            },
            TextBlock {
                text: "18C".into(),
            },
        ]));
        let invoker = ToolInvoker::new(provider, mapping());

        let result = invoker
            .invoke(&ToolCallRequest::new("a", "get_weather", "{}"))
            .await;

        assert_eq!(result.output_text, "Sunny, 18C");
    }

    #[tokio::test]
    async fn batch_collects_every_result_in_order() {
        let provider = StubProvider::returning(ProviderResult::Opaque(r#"{"temp":18}"#.into()));
        let invoker = ToolInvoker::new(provider, mapping());

        let results = invoker
            .invoke_all(&[
                ToolCallRequest::new("1", "get_weather", "{}"),
                ToolCallRequest::new("2", "nope", "{}"),
                ToolCallRequest::new("3", "fetch_url", "oops"),
            ])
            .await;

        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(results[0].output_text, r#"{"temp":18}"#);
        assert!(results[1].output_text.starts_with("Error: "));
        assert!(results[2].output_text.starts_with("Error: "));
    }
}
