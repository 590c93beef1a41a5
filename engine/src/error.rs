//! Error taxonomy for the agent loop and tool runtime (spec §7).

use thiserror::Error;

/// Errors raised by the agent loop, tool dispatch, and chat store.
///
/// Tool-level errors (`ToolValidationError`, `ToolTimeout`, `ToolHandlerError`) are
/// recovered locally by the agent loop: it surfaces them as a `tool_call_complete`
/// error event and a tool-role message, then keeps running. `LlmTransport` and
/// `TurnLimitExceeded` are terminal for the turn.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    #[error("invalid arguments for tool {tool}: {reason}")]
    ToolValidationError { tool: String, reason: String },
    #[error("tool {tool} timed out after {elapsed_ms}ms")]
    ToolTimeout { tool: String, elapsed_ms: u64 },
    #[error("tool {tool} failed: {reason}")]
    ToolHandlerError { tool: String, reason: String },
    #[error("LLM transport error: {0}")]
    LlmTransport(String),
    #[error("turn limit exceeded after {0} turns")]
    TurnLimitExceeded(u32),
    #[error("chat store conflict on chat {0}")]
    ChatStoreConflict(String),
    #[error("chat store error: {0}")]
    ChatStoreError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
}

impl EngineError {
    /// Machine-readable kind for the terminal `error{error_kind}` SSE payload.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ToolNotFound(_) => "tool_not_found",
            EngineError::ToolValidationError { .. } => "tool_validation",
            EngineError::ToolTimeout { .. } => "tool_timeout",
            EngineError::ToolHandlerError { .. } => "tool_handler",
            EngineError::LlmTransport(_) => "llm_transport",
            EngineError::TurnLimitExceeded(_) => "turn_limit",
            EngineError::ChatStoreConflict(_) => "chat_store_conflict",
            EngineError::ChatStoreError(_) => "chat_store_error",
            EngineError::SchemaError(_) => "schema_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_spec_error_taxonomy() {
        assert_eq!(EngineError::TurnLimitExceeded(10).kind(), "turn_limit");
        assert_eq!(
            EngineError::ToolTimeout { tool: "x".into(), elapsed_ms: 60_000 }.kind(),
            "tool_timeout"
        );
    }

    #[test]
    fn display_includes_context() {
        let e = EngineError::ToolHandlerError {
            tool: "get_portfolio".into(),
            reason: "broker unavailable".into(),
        };
        let s = e.to_string();
        assert!(s.contains("get_portfolio"));
        assert!(s.contains("broker unavailable"));
    }
}
