//! Agent Loop (spec §4.7, C7): drives one user turn from a new message to a terminal
//! `done`/`error` event, dispatching tool calls and looping until the model stops
//! asking for tools or `MAX_TURNS` is hit.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};

use crate::cancel::CancelToken;
use crate::chat::{ChatStore, SqliteResourceStore};
use crate::clock::Clock;
use crate::context::InvocationContext;
use crate::error::EngineError;
use crate::llm::{LlmClient, MessageChunk, ToolCallDelta, ToolChoiceMode};
use crate::message::{Message, ToolCallFunction, ToolCallKind, ToolCallRef};
use crate::stream::ToolStreamWriter;
use crate::tools::{ToolRegistry, ToolSourceError};
use config::RuntimeConfig;
use stream_event::{Event, StreamSequencer, ToolCallStatus};

pub struct AgentLoop {
    chat_store: Arc<dyn ChatStore>,
    registry: Arc<ToolRegistry>,
    llm: Arc<dyn LlmClient>,
    runtime: Arc<RuntimeConfig>,
    clock: Arc<dyn Clock>,
    resources: Arc<SqliteResourceStore>,
    /// Sub-agent nesting depth (spec §4.8) this loop's own tool calls run at.
    /// 0 for the top-level loop a turn arrives on; a [`crate::agent::SubAgentTool`]
    /// builds its inner loop with `parent_depth + 1`.
    depth: u32,
}

/// One user turn to drive to completion.
pub struct TurnRequest {
    pub user_id: String,
    pub chat_id: String,
    pub user_message: String,
    pub cancel: CancelToken,
}

type EmitFn = Arc<dyn Fn(Event) -> bool + Send + Sync>;

impl AgentLoop {
    pub fn new(
        chat_store: Arc<dyn ChatStore>,
        registry: Arc<ToolRegistry>,
        llm: Arc<dyn LlmClient>,
        runtime: Arc<RuntimeConfig>,
        clock: Arc<dyn Clock>,
        resources: Arc<SqliteResourceStore>,
    ) -> Self {
        Self::with_depth(chat_store, registry, llm, runtime, clock, resources, 0)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_depth(
        chat_store: Arc<dyn ChatStore>,
        registry: Arc<ToolRegistry>,
        llm: Arc<dyn LlmClient>,
        runtime: Arc<RuntimeConfig>,
        clock: Arc<dyn Clock>,
        resources: Arc<SqliteResourceStore>,
        depth: u32,
    ) -> Self {
        Self { chat_store, registry, llm, runtime, clock, resources, depth }
    }

    /// Runs [`TurnRequest`] to completion, emitting every event through `emit`
    /// (spec §4.1). Returns once a terminal `done` or `error` has been emitted.
    pub async fn run_turn(
        &self,
        req: TurnRequest,
        emit: impl Fn(Event) -> bool + Send + Sync + 'static,
    ) -> Result<(), EngineError> {
        // Wrap the caller's emit so every event is checked against the stream ordering
        // contract (spec §4.1, §8 properties 2-4) before it leaves this loop. A failed
        // `accept()` is a bug in the loop itself, not a retryable condition.
        let sequencer = std::sync::Mutex::new(StreamSequencer::new());
        let inner_emit = emit;
        let emit: EmitFn = Arc::new(move |event: Event| {
            let accepted = sequencer.lock().unwrap().accept(&event);
            debug_assert!(accepted, "event violates the stream ordering contract: {event:?}");
            if !accepted {
                return false;
            }
            inner_emit(event)
        });

        self.chat_store
            .append(&req.chat_id, &Message::user(req.user_message.clone(), self.clock.now()))
            .await?;

        for _turn in 0..self.runtime.max_turns {
            if req.cancel.is_cancelled() {
                emit(Event::Error { error: "cancelled".into(), details: None, timestamp: self.clock.now() });
                return Ok(());
            }

            let history = self.chat_store.latest(&req.chat_id, 100).await?;
            let tool_specs = self.registry.list()?;

            let started = Instant::now();
            let (content, tool_calls) = self.call_llm(&history, &tool_specs, &emit).await?;
            let latency_ms = started.elapsed().as_millis() as u64;

            if tool_calls.is_empty() {
                let message = Message::assistant(content.clone(), vec![], Some(latency_ms), self.clock.now());
                self.chat_store.append(&req.chat_id, &message).await?;
                emit(Event::AssistantMessage { content, needs_auth: false, timestamp: self.clock.now() });
                emit(Event::Done { message: "turn complete".into(), timestamp: self.clock.now() });
                return Ok(());
            }

            let assistant_message =
                Message::assistant(content, tool_calls.clone(), Some(latency_ms), self.clock.now());
            let tool_messages = self.run_tool_calls(&req, &tool_calls, &emit).await;
            self.chat_store.append_turn(&req.chat_id, &assistant_message, &tool_messages).await?;

            emit(Event::Thinking { message: "reviewing tool results".into(), timestamp: self.clock.now() });
        }

        let kind = EngineError::TurnLimitExceeded(self.runtime.max_turns).kind();
        emit(Event::Error {
            error: format!("turn limit exceeded after {} turns", self.runtime.max_turns),
            details: Some(serde_json::json!({ "error_kind": kind })),
            timestamp: self.clock.now(),
        });
        Err(EngineError::TurnLimitExceeded(self.runtime.max_turns))
    }

    /// Streams one LLM turn, forwarding text deltas onto the bus and accumulating
    /// tool-call deltas by index (spec §4.7 step 3) until the turn finishes.
    async fn call_llm(
        &self,
        history: &[Message],
        tool_specs: &[crate::tools::ToolSpec],
        emit: &EmitFn,
    ) -> Result<(String, Vec<ToolCallRef>), EngineError> {
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<MessageChunk>(32);
        let (delta_tx, mut delta_rx) = mpsc::channel::<ToolCallDelta>(32);

        let emit_for_chunks = emit.clone();
        let chunk_task = tokio::spawn(async move {
            while let Some(chunk) = chunk_rx.recv().await {
                emit_for_chunks(Event::AssistantMessageDelta { delta: chunk.content });
            }
        });

        let accum: Arc<Mutex<Vec<(Option<String>, Option<String>, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let accum_for_deltas = accum.clone();
        let delta_task = tokio::spawn(async move {
            while let Some(delta) = delta_rx.recv().await {
                let mut buf = accum_for_deltas.lock().await;
                if buf.len() <= delta.index {
                    buf.resize(delta.index + 1, (None, None, String::new()));
                }
                let entry = &mut buf[delta.index];
                if delta.call_id.is_some() {
                    entry.0 = delta.call_id;
                }
                if delta.name.is_some() {
                    entry.1 = delta.name;
                }
                entry.2.push_str(&delta.arguments_delta);
            }
        });

        let response = self
            .llm
            .invoke_stream(history, tool_specs, ToolChoiceMode::Auto, Some(chunk_tx), Some(delta_tx))
            .await?;

        let _ = chunk_task.await;
        let _ = delta_task.await;

        let tool_calls = accum
            .lock()
            .await
            .iter()
            .map(|(id, name, arguments)| ToolCallRef {
                id: id.clone().unwrap_or_default(),
                kind: ToolCallKind::Function,
                function: ToolCallFunction { name: name.clone().unwrap_or_default(), arguments: arguments.clone() },
            })
            .collect();

        Ok((response.content, tool_calls))
    }

    /// Dispatches every buffered tool call in order (spec §4.7 step 4), returning the
    /// tool-role messages to be committed alongside the assistant message.
    async fn run_tool_calls(&self, req: &TurnRequest, tool_calls: &[ToolCallRef], emit: &EmitFn) -> Vec<Message> {
        let mut tool_messages = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            let arguments_value: Result<serde_json::Value, _> = serde_json::from_str(&call.function.arguments);

            emit(Event::ToolCallStart {
                tool_call_id: call.id.clone(),
                tool_name: call.function.name.clone(),
                arguments: arguments_value.as_ref().cloned().unwrap_or(serde_json::Value::Null),
                timestamp: self.clock.now(),
            });

            let ctx = InvocationContext::with_depth(
                req.user_id.clone(),
                req.chat_id.clone(),
                ToolStreamWriter::new({
                    let emit = emit.clone();
                    move |event| emit(event)
                }),
                req.cancel.clone(),
                self.clock.clone(),
                self.resources.scoped(req.chat_id.clone()),
                self.depth,
            );

            let call_result = match arguments_value {
                Err(e) => Err(ToolSourceError::InvalidInput(e.to_string())),
                Ok(args) => {
                    let timeout = self.registry.timeout_for(&call.function.name).unwrap_or(self.runtime.tool_timeout);
                    match tokio::time::timeout(timeout, self.registry.call(&call.function.name, args, &ctx)).await {
                        Ok(result) => result,
                        Err(_) => Err(ToolSourceError::Transport("timeout".into())),
                    }
                }
            };

            let (status, error, resource_id, content_text) = match &call_result {
                Ok(content) => (ToolCallStatus::Completed, None, content.resource_id.clone(), content.text.clone()),
                Err(e) => (ToolCallStatus::Error, Some(e.to_string()), None, e.to_string()),
            };

            emit(Event::ToolCallComplete {
                tool_call_id: call.id.clone(),
                tool_name: call.function.name.clone(),
                status,
                resource_id: resource_id.clone(),
                error,
                timestamp: self.clock.now(),
            });

            tool_messages.push(Message::tool(
                call.id.clone(),
                call.function.name.clone(),
                content_text,
                resource_id,
                self.clock.now(),
            ));
        }

        tool_messages
    }
}
