//! SSE event protocol for the agent/strategy engine.
//!
//! Defines the wire shape of one stream event ([`Event`]), per-stream ordering
//! enforcement ([`StreamSequencer`]), and SSE framing ([`to_sse_frame`]). This crate
//! does not depend on `engine`; `engine` and `serve` produce [`Event`] values and push
//! them through this crate's formatting.

pub mod event;
pub mod sequencer;
pub mod sse;

pub use event::{Event, LogLevel, ToolCallStatus};
pub use sequencer::StreamSequencer;
pub use sse::to_sse_frame;
