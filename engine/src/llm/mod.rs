//! LLM client abstraction (spec §4.6, §6.5).
//!
//! The agent loop depends on this trait, not a concrete provider; the concrete client
//! (OpenAI-, Anthropic-, or locally-hosted-compatible) is wired in by the binary that
//! embeds this crate. Adapted from `loom`'s `LlmClient`: same single-call/streaming
//! split, retargeted at this crate's [`crate::message::Message`] and
//! [`crate::error::EngineError`], and with the tool-call delta plumbing promoted to a
//! first-class part of the trait rather than a default-implemented afterthought, since
//! the agent loop's tool-call accumulation (spec §4.7 step 2) depends on it.

mod mock;

use tokio::sync::mpsc;

pub use mock::MockLlm;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::message::{Message, ToolCallRef};
use crate::tools::ToolSpec;

/// Tool choice mode for chat completions: whether the model may, must not, or must
/// call a tool on this turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolChoiceMode {
    #[default]
    Auto,
    None,
    Required,
}

impl std::str::FromStr for ToolChoiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "none" => Ok(Self::None),
            "required" => Ok(Self::Required),
            _ => Err(format!("unknown tool_choice: {s} (use auto, none, or required)")),
        }
    }
}

/// One piece of incremental content from a streaming completion.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    pub content: String,
}

/// Incremental piece of one tool call's arguments, assembled by the agent loop into
/// a complete [`ToolCallRef`] once the stream ends (spec §4.7 step 2).
#[derive(Clone, Debug)]
pub struct ToolCallDelta {
    pub index: usize,
    pub call_id: Option<String>,
    pub name: Option<String>,
    pub arguments_delta: String,
}

#[derive(Clone, Debug, Default)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Result of one completion call: assistant text plus any tool calls the model chose.
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRef>,
    pub usage: Option<LlmUsage>,
}

/// A chat-completions-shaped LLM backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
    ) -> Result<LlmResponse, EngineError>;

    /// Streaming variant. Default implementation calls [`LlmClient::invoke`] and
    /// replays its content as a single chunk, so a non-streaming backend is still a
    /// valid `LlmClient` without extra code.
    async fn invoke_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        tool_choice: ToolChoiceMode,
        chunk_tx: Option<mpsc::Sender<MessageChunk>>,
        tool_delta_tx: Option<mpsc::Sender<ToolCallDelta>>,
    ) -> Result<LlmResponse, EngineError> {
        let response = self.invoke(messages, tools, tool_choice).await?;

        if let Some(tx) = chunk_tx {
            if !response.content.is_empty() {
                let _ = tx.send(MessageChunk { content: response.content.clone() }).await;
            }
        }
        if let Some(tx) = tool_delta_tx {
            for (index, call) in response.tool_calls.iter().enumerate() {
                let _ = tx
                    .send(ToolCallDelta {
                        index,
                        call_id: Some(call.id.clone()),
                        name: Some(call.function.name.clone()),
                        arguments_delta: call.function.arguments.clone(),
                    })
                    .await;
            }
        }

        Ok(response)
    }
}
