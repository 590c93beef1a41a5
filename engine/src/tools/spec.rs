//! Tool specification and call-result types (spec §4.2, §6.3).
//!
//! Grounded on graphweave's `tool_source::{ToolSpec, ToolCallContent, ToolSourceError}`:
//! same MCP-aligned shape, renamed into this crate's own `tools` module since there is
//! no separate "tool source" abstraction here — tools are always backed by the one
//! in-process [`crate::tools::ToolRegistry`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Tool specification handed to the LLM client ahead of each turn (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    /// Flattened JSON Schema (draft 2020-12), already processed by
    /// [`crate::tools::schema::flatten`] — no `$ref`/`$defs` remain.
    pub input_schema: Value,
}

/// Text result of a single tool call.
///
/// `resource_id` is set when the handler called `ctx.save_resource` during the call;
/// the agent loop links it onto the `tool_call_complete` event and the tool message
/// (spec §4.7 step 4c).
#[derive(Debug, Clone)]
pub struct ToolCallContent {
    pub text: String,
    pub resource_id: Option<String>,
}

impl ToolCallContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), resource_id: None }
    }

    pub fn with_resource(text: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self { text: text.into(), resource_id: Some(resource_id.into()) }
    }
}

/// Errors a [`crate::tools::Tool::call`] implementation may return.
///
/// The agent loop (spec §4.7) maps these onto [`crate::error::EngineError`] when it
/// builds the `tool_call_complete` event and the resulting tool-role message.
#[derive(Debug, Error)]
pub enum ToolSourceError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidInput(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("handler error: {0}")]
    Handler(String),
}
