//! # engine
//!
//! The Agent Loop, Tool Runtime, and Chat Store behind fincopilot's conversational
//! surface (spec §4.1–§4.8). An `engine::agent::AgentLoop` drives one user turn at a
//! time: it streams an LLM's text deltas, dispatches the tool calls the LLM asks for
//! through an `engine::tools::ToolRegistry`, persists the resulting transcript via an
//! `engine::chat::ChatStore`, and emits every step as a `stream_event::Event` so a
//! caller (typically the `serve` crate's SSE handler) can render it live.
//!
//! ## Main modules
//!
//! - [`agent`]: [`AgentLoop`], [`TurnRequest`] — the multi-turn driver (§4.7); [`SubAgentTool`] —
//!   a tool whose handler is itself a bounded inner loop (§4.8).
//! - [`tools`]: [`Tool`] trait, [`ToolRegistry`], [`tools::schema::flatten`] JSON-Schema
//!   normalization (§4.2).
//! - [`context`]: [`InvocationContext`], [`ResourceSink`] — the per-tool-call handle (§4.3).
//! - [`chat`]: [`ChatStore`]/[`SqliteChatStore`], [`SqliteResourceStore`], chat files (§4.5, §3).
//! - [`llm`]: [`LlmClient`] trait and [`MockLlm`] (§4.6 wire shape, used for tests).
//! - [`message`]: [`Message`] — the canonical transcript row shape (§6.2).
//! - [`clock`] / [`cancel`]: [`Clock`]/[`FakeClock`] and [`CancelToken`] — injected time
//!   and cooperative cancellation, not part of the spec's domain but load-bearing for
//!   every deterministic test in this crate.
//! - [`error`]: [`EngineError`], the taxonomy behind every terminal `error` event (§7).

pub mod agent;
pub mod cancel;
pub mod chat;
pub mod clock;
pub mod context;
pub mod error;
pub mod llm;
pub mod message;
pub mod stream;
pub mod tools;

pub use agent::{AgentLoop, SubAgentTool, TurnRequest};
pub use cancel::CancelToken;
pub use chat::{ChatFile, ChatFileStore, ChatStore, InMemoryChatStore, Resource, SqliteChatFileStore, SqliteChatStore, SqliteResourceStore};
pub use clock::{Clock, FakeClock, SystemClock};
pub use context::{InvocationContext, ResourceSink};
pub use error::EngineError;
pub use llm::{LlmClient, LlmResponse, LlmUsage, MessageChunk, MockLlm, ToolCallDelta, ToolChoiceMode};
pub use message::{Message, Role, ToolCallFunction, ToolCallKind, ToolCallRef};
pub use stream::ToolStreamWriter;
pub use tools::{Tool, ToolCallContent, ToolRegistry, ToolSourceError, ToolSpec};
