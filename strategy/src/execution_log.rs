//! Execution history (SPEC_FULL §11 item 2): spec §4.10 says each cycle "records an
//! execution" but doesn't specify how it's retrieved. This gives that record a shape
//! and a queryable, bounded store — in-memory by default, with a trait seam for a
//! durable backend.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sandbox::{EntrySignal, ExitSignal};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// One recorded action taken (or simulated) during a cycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ExecutorAction {
    Entered { signal: EntrySignal, size: f64, order_id: Option<String> },
    Exited { signal: ExitSignal, order_id: Option<String> },
    Skipped { signal: EntrySignal, reason: String },
}

/// One Executor cycle (spec §4.10 step 7).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub strategy_id: String,
    pub status: ExecutionStatus,
    pub mode: crate::model::Mode,
    pub error: Option<String>,
    pub actions: Vec<ExecutorAction>,
    pub logs: Vec<String>,
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait ExecutionLog: Send + Sync {
    async fn record(&self, record: ExecutionRecord);
    /// Newest first (SPEC_FULL §11 item 2).
    async fn recent(&self, strategy_id: &str, limit: usize) -> Vec<ExecutionRecord>;
}

/// Bounded per-strategy ring buffer. Default retention for a process that doesn't
/// plug in a durable backend.
pub struct InMemoryExecutionLog {
    capacity_per_strategy: usize,
    records: Mutex<std::collections::HashMap<String, VecDeque<ExecutionRecord>>>,
}

impl InMemoryExecutionLog {
    pub fn new(capacity_per_strategy: usize) -> Self {
        Self { capacity_per_strategy, records: Mutex::new(std::collections::HashMap::new()) }
    }
}

#[async_trait]
impl ExecutionLog for InMemoryExecutionLog {
    async fn record(&self, record: ExecutionRecord) {
        let mut records = self.records.lock().unwrap();
        let entry = records.entry(record.strategy_id.clone()).or_default();
        entry.push_front(record);
        while entry.len() > self.capacity_per_strategy {
            entry.pop_back();
        }
    }

    async fn recent(&self, strategy_id: &str, limit: usize) -> Vec<ExecutionRecord> {
        let records = self.records.lock().unwrap();
        records.get(strategy_id).map(|entry| entry.iter().take(limit).cloned().collect()).unwrap_or_default()
    }
}
