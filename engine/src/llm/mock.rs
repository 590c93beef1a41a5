//! Scripted [`crate::llm::LlmClient`] for agent-loop tests.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{LlmClient, LlmResponse, ToolChoiceMode};
use crate::error::EngineError;
use crate::message::{Message, ToolCallRef};
use crate::tools::ToolSpec;

/// Replays a fixed sequence of responses, one per call, then repeats the last one.
///
/// Mirrors `loom`'s `MockLlm`, generalized from a single fixed response to a script
/// so multi-turn agent-loop tests (tool call, then follow-up text) can use one client.
pub struct MockLlm {
    script: Mutex<Vec<LlmResponse>>,
}

impl MockLlm {
    pub fn new(script: Vec<LlmResponse>) -> Self {
        Self { script: Mutex::new(script) }
    }

    /// Single fixed text response, no tool calls.
    pub fn fixed_text(content: impl Into<String>) -> Self {
        Self::new(vec![LlmResponse { content: content.into(), tool_calls: vec![], usage: None }])
    }

    pub fn with_tool_call(call: ToolCallRef) -> Self {
        Self::new(vec![LlmResponse { content: String::new(), tool_calls: vec![call], usage: None }])
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(
        &self,
        _messages: &[Message],
        _tools: &[ToolSpec],
        _tool_choice: ToolChoiceMode,
    ) -> Result<LlmResponse, EngineError> {
        let mut script = self.script.lock().unwrap();
        let response = if script.len() > 1 {
            script.remove(0)
        } else {
            script
                .first()
                .map(|r| LlmResponse { content: r.content.clone(), tool_calls: r.tool_calls.clone(), usage: r.usage.clone() })
                .ok_or_else(|| EngineError::LlmTransport("MockLlm script exhausted".into()))?
        };
        Ok(response)
    }
}
