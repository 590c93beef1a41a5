use async_trait::async_trait;

use crate::context::InvocationContext;
use crate::tools::spec::{ToolCallContent, ToolSourceError, ToolSpec};

/// A single tool the agent loop can dispatch a tool call to (spec §4.2, C9 strategy
/// tools and C4 sandbox tools both implement this the same way).
///
/// Adapted from `loom`'s `Tool` trait: the per-call context is no longer optional —
/// every tool call in this system runs inside a live [`InvocationContext`], since even
/// a tool that ignores streaming still needs `cancel`/`now`/`save_resource` available.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name; must match the key this tool is registered under.
    fn name(&self) -> &str;

    /// Description and input schema sent to the LLM client ahead of each turn.
    fn spec(&self) -> ToolSpec;

    /// Declared category for scheduling and logging (SPEC_FULL §11 item 1) — e.g.
    /// `"market_data"`, `"execution"`, `"sandbox"`.
    fn category(&self) -> &str {
        "general"
    }

    /// Per-tool timeout override; `None` defers to `RuntimeConfig::tool_timeout`.
    fn timeout_override(&self) -> Option<std::time::Duration> {
        None
    }

    async fn call(
        &self,
        args: serde_json::Value,
        ctx: &InvocationContext,
    ) -> Result<ToolCallContent, ToolSourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::clock::FakeClock;
    use crate::context::ResourceSink;
    use crate::error::EngineError;
    use crate::stream::ToolStreamWriter;
    use std::sync::Arc;

    struct EchoSink;
    #[async_trait]
    impl ResourceSink for EchoSink {
        async fn save(
            &self,
            _resource_type: &str,
            _content_type: &str,
            _title: &str,
            _data: serde_json::Value,
        ) -> Result<String, EngineError> {
            Ok("res-1".into())
        }
    }

    struct PingTool;
    #[async_trait]
    impl Tool for PingTool {
        fn name(&self) -> &str {
            "ping"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec { name: "ping".into(), description: None, input_schema: serde_json::json!({}) }
        }
        async fn call(
            &self,
            _args: serde_json::Value,
            _ctx: &InvocationContext,
        ) -> Result<ToolCallContent, ToolSourceError> {
            Ok(ToolCallContent::text("pong"))
        }
    }

    #[tokio::test]
    async fn default_category_and_timeout_are_permissive() {
        let tool = PingTool;
        assert_eq!(tool.category(), "general");
        assert!(tool.timeout_override().is_none());

        let ctx = InvocationContext::new(
            "u1",
            "c1",
            ToolStreamWriter::noop(),
            CancelToken::new(),
            FakeClock::new(chrono::Utc::now()),
            Arc::new(EchoSink),
        );
        let result = tool.call(serde_json::json!({}), &ctx).await.unwrap();
        assert_eq!(result.text, "pong");
    }
}
