//! Translation of the MCP tool catalog into OpenAI function schemas.
//!
//! Model endpoints restrict function names, so every provider tool gets a
//! sanitized model-facing name. [`ToolNameMapping`] remembers the way back.

use crate::types::ToolDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{Span, debug, info_span, warn};

/// One entry of the `tools` array sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// sanitized name -> provider name. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolNameMapping {
    entries: HashMap<String, String>,
}

impl ToolNameMapping {
    pub fn resolve(&self, sanitized: &str) -> Option<&str> {
        self.entries.get(sanitized).map(String::as_str)
    }

    pub fn contains(&self, sanitized: &str) -> bool {
        self.entries.contains_key(sanitized)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A provider tool left out because its sanitized name was already taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTool {
    pub provider_name: String,
    pub sanitized_name: String,
    pub conflicts_with: String,
}

#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    pub functions: Vec<FunctionTool>,
    pub mapping: ToolNameMapping,
    pub rejected: Vec<RejectedTool>,
}

impl ToolCatalog {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Lowercase, with spaces and hyphens turned into underscores.
pub fn sanitize_tool_name(name: &str) -> String {
    name.chars()
        .map(|ch| match ch {
            ' ' | '-' => '_',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

fn default_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

pub struct ToolCatalogAdapter {
    span: Span,
}

impl Default for ToolCatalogAdapter {
    fn default() -> Self {
        Self::new(info_span!("catalog"))
    }
}

impl ToolCatalogAdapter {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Builds the model-facing catalog. Never fails: tools without a name or
    /// description are skipped and name collisions keep the first tool.
    pub fn build_catalog(&self, tools: &[ToolDescriptor]) -> ToolCatalog {
        let _entered = self.span.enter();
        let mut catalog = ToolCatalog::default();

        for tool in tools {
            let (Some(name), Some(description)) = (
                tool.name.as_deref().filter(|name| !name.trim().is_empty()),
                tool.description.as_deref(),
            ) else {
                debug!(
                    has_name = tool.name.is_some(),
                    has_description = tool.description.is_some(),
                    "Skipping tool missing required attributes"
                );
                continue;
            };

            let sanitized = sanitize_tool_name(name);
            if let Some(existing) = catalog.mapping.resolve(&sanitized) {
                warn!(
                    tool = name,
                    sanitized = sanitized.as_str(),
                    conflicts_with = existing,
                    "Rejecting tool whose sanitized name is already taken"
                );
                catalog.rejected.push(RejectedTool {
                    provider_name: name.to_string(),
                    sanitized_name: sanitized,
                    conflicts_with: existing.to_string(),
                });
                continue;
            }

            catalog
                .mapping
                .entries
                .insert(sanitized.clone(), name.to_string());
            catalog.functions.push(FunctionTool {
                kind: "function".to_string(),
                function: FunctionDefinition {
                    name: sanitized,
                    description: description.to_string(),
                    parameters: tool
                        .input_schema
                        .clone()
                        .unwrap_or_else(default_input_schema),
                },
            });
            debug!(tool = name, "Converted tool to function schema");
        }

        debug!(
            accepted = catalog.functions.len(),
            rejected = catalog.rejected.len(),
            "Tool catalog built"
        );
        catalog
    }
}
