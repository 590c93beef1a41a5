//! Invocation Context (spec §4.3, C3): the per-tool-call handle into the rest of the
//! running system.
//!
//! Adapted from `loom`'s `ToolCallContext`, which carried the chat's recent messages.
//! This context instead carries the four things a tool handler needs to act like a
//! first-class citizen of the agent loop: where to stream progress, how to notice the
//! client hung up, what time it is, and how to persist a resource it produced.

use std::sync::Arc;

use crate::clock::Clock;
use crate::cancel::CancelToken;
use crate::error::EngineError;
use crate::stream::ToolStreamWriter;

/// Saves a tool-produced artifact and returns its resource id.
///
/// Write-only by design (spec §4.3): a tool can create a resource but the context
/// gives it no way to read another tool's resources back, keeping handlers free of
/// accidental cross-call coupling.
#[async_trait::async_trait]
pub trait ResourceSink: Send + Sync {
    async fn save(
        &self,
        resource_type: &str,
        content_type: &str,
        title: &str,
        data: serde_json::Value,
    ) -> Result<String, EngineError>;
}

/// Handed to [`crate::tools::Tool::call`] for the duration of one tool invocation.
///
/// Scoped resource rule (spec §4.3): once the tool call returns, the agent loop drops
/// its clone of the context. A handler that stashed a clone and keeps emitting after
/// return is emitting into a context nobody is listening on any more — `stream.emit_*`
/// calls still report their normal `bool`, but after the owning chat stream closes the
/// false return is the only feedback a straggling handler gets.
#[derive(Clone)]
pub struct InvocationContext {
    pub user_id: String,
    pub chat_id: String,
    pub stream: ToolStreamWriter,
    pub cancel: CancelToken,
    /// Sub-agent nesting depth (spec §4.8): 0 for a top-level agent loop's tool
    /// calls, incremented by one for each Sub-Agent Delegation boundary crossed.
    pub depth: u32,
    clock: Arc<dyn Clock>,
    resources: Arc<dyn ResourceSink>,
}

impl InvocationContext {
    pub fn new(
        user_id: impl Into<String>,
        chat_id: impl Into<String>,
        stream: ToolStreamWriter,
        cancel: CancelToken,
        clock: Arc<dyn Clock>,
        resources: Arc<dyn ResourceSink>,
    ) -> Self {
        Self::with_depth(user_id, chat_id, stream, cancel, clock, resources, 0)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_depth(
        user_id: impl Into<String>,
        chat_id: impl Into<String>,
        stream: ToolStreamWriter,
        cancel: CancelToken,
        clock: Arc<dyn Clock>,
        resources: Arc<dyn ResourceSink>,
        depth: u32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            stream,
            cancel,
            depth,
            clock,
            resources,
        }
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub async fn save_resource(
        &self,
        resource_type: &str,
        content_type: &str,
        title: &str,
        data: serde_json::Value,
    ) -> Result<String, EngineError> {
        self.resources.save(resource_type, content_type, title, data).await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
