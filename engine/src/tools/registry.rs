use std::collections::HashMap;

use crate::context::InvocationContext;
use crate::error::EngineError;
use crate::tools::schema;
use crate::tools::spec::{ToolCallContent, ToolSourceError, ToolSpec};
use crate::tools::r#trait::Tool;

/// Holds every tool available to the agent loop (spec §4.2, C9 strategy bindings).
///
/// Adapted from graphweave's `ToolRegistry`, with its `ToolRegistryLocked` RwLock
/// wrapper dropped: tools in this system are registered once at process start and
/// never change afterward, so the registry is shared read-only via `Arc<ToolRegistry>`
/// rather than guarded for concurrent mutation.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Specs for every registered tool, flattened (spec §4.2: the registry MUST
    /// flatten any schema before exposing tools to the LLM client).
    pub fn list(&self) -> Result<Vec<ToolSpec>, EngineError> {
        self.tools.values().map(|t| flatten_spec(t.spec())).collect()
    }

    /// Specs filtered to one category (SPEC_FULL §11 item 1), e.g. for a sub-agent
    /// that should only see `"market_data"` tools. Flattened the same as [`Self::list`].
    pub fn list_by_category(&self, category: &str) -> Result<Vec<ToolSpec>, EngineError> {
        self.tools
            .values()
            .filter(|t| t.category() == category)
            .map(|t| flatten_spec(t.spec()))
            .collect()
    }

    pub fn timeout_for(&self, name: &str) -> Option<std::time::Duration> {
        self.tools.get(name).and_then(|t| t.timeout_override())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn call(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: &InvocationContext,
    ) -> Result<ToolCallContent, ToolSourceError> {
        match self.tools.get(name) {
            Some(tool) => tool.call(args, ctx).await,
            None => Err(ToolSourceError::NotFound(name.to_string())),
        }
    }
}

fn flatten_spec(mut spec: ToolSpec) -> Result<ToolSpec, EngineError> {
    spec.input_schema = schema::flatten(&spec.input_schema)?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::clock::FakeClock;
    use crate::context::ResourceSink;
    use crate::error::EngineError;
    use crate::stream::ToolStreamWriter;
    use async_trait::async_trait;
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

    struct DummyTool(&'static str, &'static str);
    #[async_trait]
    impl Tool for DummyTool {
        fn name(&self) -> &str {
            self.0
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec { name: self.0.into(), description: None, input_schema: serde_json::json!({}) }
        }
        fn category(&self) -> &str {
            self.1
        }
        async fn call(
            &self,
            _args: serde_json::Value,
            _ctx: &InvocationContext,
        ) -> Result<ToolCallContent, ToolSourceError> {
            Ok(ToolCallContent::text(format!("{} ran", self.0)))
        }
    }

    fn test_ctx() -> InvocationContext {
        InvocationContext::new(
            "u1",
            "c1",
            ToolStreamWriter::noop(),
            CancelToken::new(),
            FakeClock::new(chrono::Utc::now()),
            Arc::new(EchoSink),
        )
    }

    #[test]
    fn list_by_category_filters() {
        let mut reg = ToolRegistry::new();
        reg.register(Box::new(DummyTool("get_quote", "market_data")));
        reg.register(Box::new(DummyTool("place_order", "execution")));
        assert_eq!(reg.list_by_category("market_data").unwrap().len(), 1);
        assert_eq!(reg.list().unwrap().len(), 2);
    }

    struct RefSchemaTool;
    #[async_trait]
    impl Tool for RefSchemaTool {
        fn name(&self) -> &str {
            "place_order"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "place_order".into(),
                description: None,
                input_schema: serde_json::json!({
                    "$schema": "https://json-schema.org/draft/2020-12/schema",
                    "title": "PlaceOrderArgs",
                    "type": "object",
                    "properties": { "order": { "$ref": "#/$defs/Order" } },
                    "$defs": { "Order": { "type": "object", "properties": { "qty": { "type": "number" } } } }
                }),
            }
        }
        async fn call(
            &self,
            _args: serde_json::Value,
            _ctx: &InvocationContext,
        ) -> Result<ToolCallContent, ToolSourceError> {
            Ok(ToolCallContent::text("ok"))
        }
    }

    #[test]
    fn list_flattens_ref_and_defs_schemas_before_exposing_them() {
        let mut reg = ToolRegistry::new();
        reg.register(Box::new(RefSchemaTool));
        let specs = reg.list().unwrap();
        let rendered = serde_json::to_string(&specs[0].input_schema).unwrap();
        assert!(!rendered.contains("$ref"), "rendered: {rendered}");
        assert!(!rendered.contains("$defs"), "rendered: {rendered}");
        assert!(!rendered.contains("$schema"), "rendered: {rendered}");
        assert_eq!(specs[0].input_schema["properties"]["order"]["properties"]["qty"]["type"], "number");
    }

    #[tokio::test]
    async fn call_unknown_tool_returns_not_found() {
        let reg = ToolRegistry::new();
        let ctx = test_ctx();
        let err = reg.call("missing", serde_json::json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolSourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn call_dispatches_to_registered_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Box::new(DummyTool("ping", "general")));
        let ctx = test_ctx();
        let result = reg.call("ping", serde_json::json!({}), &ctx).await.unwrap();
        assert_eq!(result.text, "ping ran");
    }
}
