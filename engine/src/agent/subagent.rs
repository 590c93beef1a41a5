//! Sub-Agent Delegation (spec §4.8, C8): a [`Tool`] whose handler is itself a bounded
//! [`AgentLoop`] with its own registry and system prompt.
//!
//! One concrete `Agent` type parameterized by `(Registry, SystemPrompt, MaxTurns)`
//! per the spec's redesign note — a sub-agent is this same [`AgentLoop`] wrapped in a
//! tool handler, not a distinct type in an inheritance hierarchy.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use stream_event::Event;

use crate::agent::loop_::{AgentLoop, TurnRequest};
use crate::chat::{InMemoryChatStore, SqliteResourceStore};
use crate::clock::Clock;
use crate::context::InvocationContext;
use crate::llm::LlmClient;
use crate::tools::{Tool, ToolCallContent, ToolRegistry, ToolSourceError, ToolSpec};
use config::RuntimeConfig;

#[derive(Deserialize)]
struct SubAgentArgs {
    message: String,
}

/// A named sub-agent specialist (spec §4.8 use cases: a plotting specialist, a
/// code-generation specialist). The parent tool call's arguments become this
/// sub-agent's user message; its terminal assistant text becomes the parent tool
/// call's result.
pub struct SubAgentTool {
    name: String,
    description: String,
    system_prompt: String,
    registry: Arc<ToolRegistry>,
    llm: Arc<dyn LlmClient>,
    runtime: Arc<RuntimeConfig>,
    clock: Arc<dyn Clock>,
    resources: Arc<SqliteResourceStore>,
}

impl SubAgentTool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        registry: Arc<ToolRegistry>,
        llm: Arc<dyn LlmClient>,
        runtime: Arc<RuntimeConfig>,
        clock: Arc<dyn Clock>,
        resources: Arc<SqliteResourceStore>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            registry,
            llm,
            runtime,
            clock,
            resources,
        }
    }
}

#[async_trait]
impl Tool for SubAgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "message": { "type": "string" } },
                "required": ["message"],
            }),
        }
    }

    fn category(&self) -> &str {
        "sub_agent"
    }

    async fn call(
        &self,
        args: serde_json::Value,
        ctx: &InvocationContext,
    ) -> Result<ToolCallContent, ToolSourceError> {
        if ctx.depth >= self.runtime.max_subagent_depth {
            return Err(ToolSourceError::InvalidInput(format!(
                "sub-agent '{}' refused: depth {} already at the configured limit of {} (spec §4.8 recursion bound)",
                self.name, ctx.depth, self.runtime.max_subagent_depth
            )));
        }

        let parsed: SubAgentArgs =
            serde_json::from_value(args).map_err(|e| ToolSourceError::InvalidInput(e.to_string()))?;

        let chat_store = Arc::new(InMemoryChatStore::new());
        let inner_loop = AgentLoop::with_depth(
            chat_store,
            self.registry.clone(),
            self.llm.clone(),
            self.runtime.clone(),
            self.clock.clone(),
            self.resources.clone(),
            ctx.depth + 1,
        );

        let req = TurnRequest {
            user_id: ctx.user_id.clone(),
            chat_id: format!("subagent-{}-{}", self.name, uuid::Uuid::new_v4()),
            user_message: format!("{}\n\n{}", self.system_prompt, parsed.message),
            cancel: ctx.cancel.clone(),
        };

        let final_text: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let error_text: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let parent_emit = ctx.stream.raw();
        let captured_text = final_text.clone();
        let captured_error = error_text.clone();
        let forward = move |event: Event| {
            match &event {
                Event::AssistantMessage { content, .. } => {
                    *captured_text.lock().unwrap() = Some(content.clone());
                }
                Event::Error { error, .. } => {
                    *captured_error.lock().unwrap() = Some(error.clone());
                }
                Event::Done { .. } => return true,
                _ => {}
            }
            parent_emit(event)
        };

        inner_loop
            .run_turn(req, forward)
            .await
            .map_err(|e| ToolSourceError::Handler(e.to_string()))?;

        if let Some(error) = error_text.lock().unwrap().take() {
            return Err(ToolSourceError::Handler(error));
        }

        let text = final_text.lock().unwrap().take().unwrap_or_default();
        Ok(ToolCallContent::text(text))
    }
}
