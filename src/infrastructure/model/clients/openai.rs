//! OpenAI-compatible client implementation

use async_trait::async_trait;
use serde::Serialize;
use tracing::{Instrument, Span, debug, info, info_span};

use super::base::HttpClientBase;
use crate::application::catalog::FunctionTool;
use crate::config::LlmConfig;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::traits::ModelProvider;
use crate::infrastructure::model::types::{CompletionRequest, ModelError, RawCompletion};

const CHAT_COMPLETIONS_PATH: &str = "chat/completions";

/// OpenAI-compatible client (works with OpenAI, Ollama, vLLM, Groq, etc.)
#[derive(Clone)]
pub struct OpenAIClient {
    base: HttpClientBase,
    span: Span,
}

impl OpenAIClient {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            base: HttpClientBase::new(config.base_url.clone(), config.api_key.clone()),
            span: info_span!("llm", endpoint = %config.base_url),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn completions_url(&self) -> String {
        self.base.build_url(CHAT_COMPLETIONS_PATH)
    }
}

#[async_trait]
impl ModelProvider for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<RawCompletion, ModelError> {
        let url = self.completions_url();
        let payload = OpenAIRequest::from(&request);

        async {
            info!(
                model = request.model.as_str(),
                messages = request.messages.len(),
                tools = request.tools.as_ref().map_or(0, Vec::len),
                "Sending request to OpenAI-compatible endpoint"
            );
            let completion: RawCompletion = self.base.post_json(&url, &payload).await?;
            debug!(choices = completion.choices.len(), "Received completion");
            Ok(completion)
        }
        .instrument(self.span.clone())
        .await
    }
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [FunctionTool]>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

impl<'a> From<&'a CompletionRequest> for OpenAIRequest<'a> {
    fn from(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: MessageAdapter::to_openai_format(&request.messages),
            tools: request
                .tools
                .as_deref()
                .filter(|tools| !tools.is_empty()),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }
}
