use crate::application::bridge::McpLlmBridge;
use crate::application::tooling::ToolProvider;
use crate::model::ModelProvider;
use thiserror::Error;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

pub const PROMPT: &str = "Enter your prompt (or 'quit' to exit): ";
const QUIT_WORDS: [&str; 3] = ["quit", "exit", "q"];

#[derive(Debug, Error)]
pub enum StdioError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn is_quit(line: &str) -> bool {
    let line = line.trim();
    QUIT_WORDS.iter().any(|word| line.eq_ignore_ascii_case(word))
}

/// Interactive loop over the process's stdin and stdout. Ends on a quit
/// word, end of input, or Ctrl-C.
pub async fn run<M, T>(bridge: &mut McpLlmBridge<M, T>) -> Result<(), StdioError>
where
    M: ModelProvider,
    T: ToolProvider,
{
    let stdin = BufReader::new(io::stdin());
    let stdout = io::stdout();
    tokio::select! {
        result = run_with(bridge, stdin, stdout) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, leaving interactive mode");
            Ok(())
        }
    }
}

/// Reads prompts line by line from `input` and writes each answer to `output`.
pub async fn run_with<M, T, R, W>(
    bridge: &mut McpLlmBridge<M, T>,
    input: R,
    mut output: W,
) -> Result<(), StdioError>
where
    M: ModelProvider,
    T: ToolProvider,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            debug!("Input closed");
            break;
        };
        if is_quit(&line) {
            break;
        }
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        let response = bridge.process_message(prompt).await;
        output
            .write_all(format!("\nResponse: {response}\n\n").as_bytes())
            .await?;
        output.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bridge::BridgeOptions;
    use crate::application::tooling::ToolInvokeError;
    use crate::model::{CompletionRequest, ModelError, RawCompletion};
    use crate::types::{ProviderResult, ToolDescriptor};
    use async_trait::async_trait;
    use serde_json::{Map as JsonMap, Value};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct EchoModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelProvider for EchoModel {
        async fn complete(&self, request: CompletionRequest) -> Result<RawCompletion, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let last = request
                .messages
                .last()
                .map(|message| message.content().to_string())
                .unwrap_or_default();
            Ok(RawCompletion::text(format!("echo {last}"), "stop"))
        }
    }

    struct NoTools;

    #[async_trait]
    impl ToolProvider for NoTools {
        async fn connect(&self) -> Result<(), ToolInvokeError> {
            Ok(())
        }

        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolInvokeError> {
            Ok(Vec::new())
        }

        async fn call_tool(
            &self,
            _name: &str,
            _arguments: JsonMap<String, Value>,
        ) -> Result<ProviderResult, ToolInvokeError> {
            Ok(ProviderResult::PlainText(String::new()))
        }

        async fn disconnect(&self) {}
    }

    fn echo_bridge() -> McpLlmBridge<EchoModel, NoTools> {
        McpLlmBridge::new(
            EchoModel::default(),
            Arc::new(NoTools),
            BridgeOptions::new("m"),
        )
    }

    #[test]
    fn quit_words_are_case_insensitive() {
        assert!(is_quit("quit"));
        assert!(is_quit("  EXIT "));
        assert!(is_quit("q"));
        assert!(!is_quit("quite"));
    }

    #[tokio::test]
    async fn answers_each_line_until_quit() {
        let mut bridge = echo_bridge();
        let input: &[u8] = b"hello\n\nworld\nquit\nnever\n";
        let mut output = Vec::new();

        run_with(&mut bridge, input, &mut output).await.expect("loop");

        let text = String::from_utf8(output).expect("utf8");
        assert!(text.contains("Response: echo hello"));
        assert!(text.contains("Response: echo world"));
        assert!(!text.contains("never"));
        assert!(text.starts_with(PROMPT));
        assert_eq!(bridge.history().len(), 4);
    }

    #[tokio::test]
    async fn end_of_input_ends_loop() {
        let mut bridge = echo_bridge();
        let input: &[u8] = b"only\n";
        let mut output = Vec::new();

        run_with(&mut bridge, input, &mut output).await.expect("loop");

        let text = String::from_utf8(output).expect("utf8");
        assert_eq!(text.matches(PROMPT).count(), 2);
        assert!(text.contains("Response: echo only"));
    }
}
