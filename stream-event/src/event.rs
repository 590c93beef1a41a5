//! Event kinds carried on the client-facing event bus (spec §4.1).
//!
//! Each variant is the payload of one SSE `data:` line; `type` comes from the
//! serde tag. Framing lives in [`crate::sse`], ordering in [`crate::sequencer`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Log level for a [`Event::ToolLog`] line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Terminal status of one tool invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Completed,
    Error,
}

/// One event on the bus. Field names are normative (spec §4.1, §6.1).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    AssistantMessageDelta { delta: String },
    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
        timestamp: DateTime<Utc>,
    },
    ToolStatus {
        status: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    ToolLog {
        level: LogLevel,
        message: String,
        timestamp: DateTime<Utc>,
    },
    ToolProgress {
        percent: f32,
        message: String,
        timestamp: DateTime<Utc>,
    },
    ToolCallComplete {
        tool_call_id: String,
        tool_name: String,
        status: ToolCallStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        resource_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Thinking { message: String, timestamp: DateTime<Utc> },
    AssistantMessage {
        content: String,
        needs_auth: bool,
        timestamp: DateTime<Utc>,
    },
    Done { message: String, timestamp: DateTime<Utc> },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// True for the two events that may legally end a stream (spec §4.1 ordering contract 3/4).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Done { .. } | Event::Error { .. })
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
