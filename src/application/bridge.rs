//! The conversation loop tying the model endpoint to the MCP tool provider.

use crate::application::catalog::{ToolCatalog, ToolCatalogAdapter};
use crate::application::invoker::ToolInvoker;
use crate::application::tooling::{McpProcess, ToolInvokeError, ToolProvider};
use crate::config::AppConfig;
use crate::config::defaults::{DEFAULT_MAX_TOKENS, DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_TEMPERATURE};
use crate::model::{CompletionRequest, ModelError, ModelProvider, OpenAIClient, normalize};
use crate::types::{ConversationMessage, NormalizedResponse, ToolCallRequest, ToolCallResult};
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

const ROUND_LIMIT_OUTPUT: &str = "Error: tool round limit reached";
const NOT_EXECUTED_OUTPUT: &str = "Error: tool call not executed";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("model kept requesting tools after {limit} rounds")]
    TooManyToolRounds { limit: usize },
    #[error("bridge initialization failed: {0}")]
    Initialization(#[source] ToolInvokeError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Tool rounds allowed per user message before the exchange is abandoned.
    pub max_tool_rounds: usize,
}

impl BridgeOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }
}

/// One conversation session between a user, the model, and the tool provider.
///
/// The history is append-only and owned by this value; `process_message`
/// takes `&mut self`, so only one exchange is ever in flight.
pub struct McpLlmBridge<M: ModelProvider, T: ToolProvider> {
    model: M,
    provider: Arc<T>,
    options: BridgeOptions,
    catalog: ToolCatalog,
    invoker: ToolInvoker<T>,
    history: Vec<ConversationMessage>,
    span: Span,
}

impl McpLlmBridge<OpenAIClient, McpProcess> {
    /// Wires the OpenAI-compatible client and the stdio MCP server from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let span = info_span!("bridge", model = %config.llm.model);
        let model = OpenAIClient::from_config(&config.llm)
            .with_span(info_span!(parent: &span, "llm"));
        let provider = McpProcess::with_span(
            config.server.clone(),
            info_span!(parent: &span, "mcp", server = %config.server.name),
        );
        Self::with_span(model, Arc::new(provider), BridgeOptions::from_config(config), span)
    }
}

impl<M: ModelProvider, T: ToolProvider> McpLlmBridge<M, T> {
    pub fn new(model: M, provider: Arc<T>, options: BridgeOptions) -> Self {
        let span = info_span!("bridge", model = %options.model);
        Self::with_span(model, provider, options, span)
    }

    /// Creates the bridge logging under `span`; components log under child spans.
    pub fn with_span(model: M, provider: Arc<T>, options: BridgeOptions, span: Span) -> Self {
        let catalog = ToolCatalog::default();
        let invoker = ToolInvoker::with_span(
            provider.clone(),
            catalog.mapping.clone(),
            info_span!(parent: &span, "invoker"),
        );
        Self {
            model,
            provider,
            options,
            catalog,
            invoker,
            history: Vec::new(),
            span,
        }
    }

    /// Connects to the provider and builds the tool catalog. Failures are
    /// logged and reported as `false`.
    pub async fn initialize(&mut self) -> bool {
        let span = self.span.clone();
        match self.try_initialize().instrument(span).await {
            Ok(()) => true,
            Err(err) => {
                let _entered = self.span.enter();
                error!(%err, "Bridge initialization failed");
                false
            }
        }
    }

    pub(crate) async fn try_initialize(&mut self) -> Result<(), ToolInvokeError> {
        self.provider.connect().await?;
        let tools = self.provider.list_tools().await?;
        debug!(count = tools.len(), "MCP tools received");

        let adapter = ToolCatalogAdapter::new(info_span!(parent: &self.span, "catalog"));
        self.catalog = adapter.build_catalog(&tools);
        self.invoker = ToolInvoker::with_span(
            self.provider.clone(),
            self.catalog.mapping.clone(),
            info_span!(parent: &self.span, "invoker"),
        );
        info!(
            tools = self.catalog.functions.len(),
            rejected = self.catalog.rejected.len(),
            "Bridge initialized"
        );
        Ok(())
    }

    /// Runs one user message to completion. Never fails: errors come back as
    /// `"Error processing message: <message>"`.
    pub async fn process_message(&mut self, text: &str) -> String {
        let span = self.span.clone();
        match self.run_exchange(text).instrument(span).await {
            Ok(content) => content,
            Err(err) => {
                let _entered = self.span.enter();
                error!(%err, "Error processing message");
                format!("Error processing message: {err}")
            }
        }
    }

    async fn run_exchange(&mut self, text: &str) -> Result<String, BridgeError> {
        debug!(message = text, "Sending message to LLM");
        self.history.push(ConversationMessage::user(text));
        let mut response = self.invoke_model().await?;
        let mut rounds = 0;

        while response.is_tool_call && !response.tool_calls.is_empty() {
            if rounds >= self.options.max_tool_rounds {
                warn!(limit = self.options.max_tool_rounds, "Tool round limit reached");
                self.answer_unexecuted(&response.tool_calls, ROUND_LIMIT_OUTPUT);
                return Err(BridgeError::TooManyToolRounds {
                    limit: self.options.max_tool_rounds,
                });
            }
            rounds += 1;

            debug!(round = rounds, calls = response.tool_calls.len(), "Tool calls detected");
            let results = self.invoker.invoke_all(&response.tool_calls).await;
            self.history
                .extend(results.into_iter().map(ConversationMessage::tool));
            response = self.invoke_model().await?;
        }

        if !response.tool_calls.is_empty() {
            debug!(
                stop_reason = response.stop_reason.as_str(),
                calls = response.tool_calls.len(),
                "Final response carried tool calls; leaving them unexecuted"
            );
            self.answer_unexecuted(&response.tool_calls, NOT_EXECUTED_OUTPUT);
        }

        Ok(response.content)
    }

    /// Every stored assistant tool call needs a tool reply, or the next
    /// request is rejected by the endpoint.
    fn answer_unexecuted(&mut self, calls: &[ToolCallRequest], output: &str) {
        self.history.extend(calls.iter().map(|call| {
            ConversationMessage::tool(ToolCallResult {
                id: call.id.clone(),
                output_text: output.to_string(),
            })
        }));
    }

    async fn invoke_model(&mut self) -> Result<NormalizedResponse, BridgeError> {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        if let Some(system) = &self.options.system_prompt {
            messages.push(ConversationMessage::system(system.clone()));
        }
        messages.extend(self.history.iter().cloned());

        let request = CompletionRequest {
            model: self.options.model.clone(),
            messages,
            tools: (!self.catalog.is_empty()).then(|| self.catalog.functions.clone()),
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        };

        let completion = self.model.complete(request).await?;
        let response = normalize(&completion)?;
        debug!(
            stop_reason = response.stop_reason.as_str(),
            tool_calls = response.tool_calls.len(),
            "LLM response received"
        );
        self.history.push(ConversationMessage::assistant(
            response.content.clone(),
            response.tool_calls.clone(),
        ));
        Ok(response)
    }

    /// Releases the provider connection. Safe to call more than once.
    pub async fn close(&mut self) {
        let span = self.span.clone();
        self.provider.disconnect().instrument(span).await;
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    /// Clears the conversation; the tool catalog is kept.
    pub fn reset_history(&mut self) {
        self.history.clear();
    }

    pub fn tools(&self) -> &ToolCatalog {
        &self.catalog
    }
}

/// Owns an initialized bridge and guarantees the provider is released.
///
/// `open` never hands out a bridge whose initialization failed. Call
/// [`BridgeManager::close`] on the way out; if the manager is dropped
/// instead (panic, cancelled task), the stdio child is killed on drop.
pub struct BridgeManager<M: ModelProvider, T: ToolProvider> {
    bridge: McpLlmBridge<M, T>,
}

impl BridgeManager<OpenAIClient, McpProcess> {
    pub async fn from_config(config: &AppConfig) -> Result<Self, BridgeError> {
        Self::from_bridge(McpLlmBridge::from_config(config)).await
    }
}

impl<M: ModelProvider, T: ToolProvider> BridgeManager<M, T> {
    pub async fn open(
        model: M,
        provider: Arc<T>,
        options: BridgeOptions,
    ) -> Result<Self, BridgeError> {
        Self::from_bridge(McpLlmBridge::new(model, provider, options)).await
    }

    async fn from_bridge(mut bridge: McpLlmBridge<M, T>) -> Result<Self, BridgeError> {
        let span = bridge.span.clone();
        if let Err(err) = bridge.try_initialize().instrument(span).await {
            bridge.close().await;
            return Err(BridgeError::Initialization(err));
        }
        Ok(Self { bridge })
    }

    pub fn bridge(&self) -> &McpLlmBridge<M, T> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut McpLlmBridge<M, T> {
        &mut self.bridge
    }

    pub async fn close(mut self) {
        self.bridge.close().await;
    }
}
