//! Per-stream ordering enforcement (spec §4.1 ordering contracts, §8 properties 2–4).
//!
//! One [`StreamSequencer`] is owned per client stream (one per agent-loop turn). It
//! rejects (as a programmer error, via `debug_assert!`) events that would violate the
//! contract rather than silently reordering them — producers are expected to already
//! emit in the right order; this just catches regressions in tests.

use crate::event::Event;
use std::collections::HashSet;

/// Tracks open tool calls and terminal-event state for one stream.
#[derive(Default)]
pub struct StreamSequencer {
    open_tool_calls: HashSet<String>,
    seen_tool_calls: HashSet<String>,
    assistant_message_emitted: bool,
    done: bool,
}

impl StreamSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `event` as about to be sent. Returns `false` if sending it would
    /// violate the ordering contract (caller should treat this as a bug, not retry).
    pub fn accept(&mut self, event: &Event) -> bool {
        if self.done {
            return false;
        }
        match event {
            Event::ToolCallStart { tool_call_id, .. } => {
                if self.seen_tool_calls.contains(tool_call_id) {
                    return false;
                }
                self.open_tool_calls.insert(tool_call_id.clone());
                self.seen_tool_calls.insert(tool_call_id.clone());
            }
            Event::ToolCallComplete { tool_call_id, .. } => {
                if !self.open_tool_calls.remove(tool_call_id) {
                    return false;
                }
            }
            Event::ToolStatus { .. } | Event::ToolLog { .. } | Event::ToolProgress { .. } => {
                // Valid only while at least one tool call is open; the bus doesn't carry
                // a tool_call_id on these per spec §4.1, so we only check "some call is open".
                if self.open_tool_calls.is_empty() {
                    return false;
                }
            }
            Event::AssistantMessage { .. } => {
                if self.assistant_message_emitted {
                    return false;
                }
                self.assistant_message_emitted = true;
            }
            Event::Done { .. } | Event::Error { .. } => {
                self.done = true;
            }
            Event::Thinking { .. } | Event::AssistantMessageDelta { .. } => {}
        }
        true
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}
