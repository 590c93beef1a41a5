//! Type-erased event emitter handed to tool handlers (spec §4.1, §4.3 `stream`).
//!
//! Adapted from `loom`'s `ToolStreamWriter`: same type-erased `Arc<dyn Fn>` shape, but
//! emits [`stream_event::Event`] values instead of arbitrary JSON, and is restricted
//! to the non-terminal event kinds a tool handler is allowed to produce.

use std::fmt::Debug;
use std::sync::Arc;
use stream_event::Event;

/// Emits tool-side events onto the Event Bus. Non-blocking: the underlying send is a
/// `try_send`-shaped call that reports success/failure rather than awaiting backpressure,
/// matching the instruction that a handler blocked on `emit` counts as "suspended", not stuck.
#[derive(Clone)]
pub struct ToolStreamWriter {
    emit_fn: Arc<dyn Fn(Event) -> bool + Send + Sync>,
}

impl ToolStreamWriter {
    pub fn new(emit_fn: impl Fn(Event) -> bool + Send + Sync + 'static) -> Self {
        Self { emit_fn: Arc::new(emit_fn) }
    }

    /// A writer that discards everything; used when a tool call has no live stream
    /// (e.g. replaying a strategy cycle in dry-run).
    pub fn noop() -> Self {
        Self::new(|_| false)
    }

    pub fn emit_status(&self, status: impl Into<String>, message: impl Into<String>) -> bool {
        (self.emit_fn)(Event::ToolStatus {
            status: status.into(),
            message: message.into(),
            timestamp: chrono::Utc::now(),
        })
    }

    pub fn emit_log(&self, level: stream_event::LogLevel, message: impl Into<String>) -> bool {
        (self.emit_fn)(Event::ToolLog {
            level,
            message: message.into(),
            timestamp: chrono::Utc::now(),
        })
    }

    pub fn emit_progress(&self, percent: f32, message: impl Into<String>) -> bool {
        (self.emit_fn)(Event::ToolProgress {
            percent: percent.clamp(0.0, 100.0),
            message: message.into(),
            timestamp: chrono::Utc::now(),
        })
    }

    /// The underlying emitter, unrestricted to the tool-safe subset above.
    ///
    /// Not exposed outside the crate: ordinary tool handlers only ever get
    /// `emit_status`/`emit_log`/`emit_progress`. [`crate::agent::SubAgentTool`] uses
    /// this to forward its inner agent loop's events verbatim (spec §4.8) rather than
    /// synthesize new ones.
    pub(crate) fn raw(&self) -> Arc<dyn Fn(Event) -> bool + Send + Sync> {
        self.emit_fn.clone()
    }
}

impl Debug for ToolStreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolStreamWriter").finish_non_exhaustive()
    }
}

impl Default for ToolStreamWriter {
    fn default() -> Self {
        Self::noop()
    }
}
