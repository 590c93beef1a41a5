//! JSON Schema (draft 2020-12) flattening for tool input schemas (spec §4.2, §6.3).
//!
//! LLM tool-calling APIs expect a single self-contained object schema: no `$defs`,
//! no `$ref`, no document-level `$schema`/`title` noise. This inlines every `$ref`
//! that points into `$defs` and strips the fields a tool-calling API rejects or ignores.

use serde_json::Value;
use std::collections::HashSet;

use crate::error::EngineError;

/// Flattens a schema produced by `schemars` (or hand-written) into the shape the
/// LLM client can send verbatim as a tool's `input_schema`.
///
/// Returns `EngineError::SchemaError` if a `$ref` points outside `#/$defs/...` or if
/// the `$defs` graph is cyclic — a cycle can't be flattened into a tree.
pub fn flatten(schema: &Value) -> Result<Value, EngineError> {
    let defs = schema.get("$defs").cloned().unwrap_or(Value::Object(Default::default()));
    let mut root = schema.clone();
    strip_noise(&mut root);
    let mut seen = HashSet::new();
    inline_refs(&mut root, &defs, &mut seen)?;
    Ok(root)
}

fn strip_noise(value: &mut Value) {
    if let Value::Object(map) = value {
        map.remove("$schema");
        map.remove("title");
        map.remove("$defs");
        map.remove("additionalProperties");
    }
}

fn inline_refs(value: &mut Value, defs: &Value, seen: &mut HashSet<String>) -> Result<(), EngineError> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(r)) = map.get("$ref").cloned() {
                let name = r
                    .strip_prefix("#/$defs/")
                    .ok_or_else(|| EngineError::SchemaError(format!("unsupported $ref target: {r}")))?;
                if !seen.insert(name.to_string()) {
                    return Err(EngineError::SchemaError(format!("cyclic $ref on {name}")));
                }
                let target = defs
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EngineError::SchemaError(format!("$ref target not found: {name}")))?;
                *value = target;
                strip_noise(value);
                inline_refs(value, defs, seen)?;
                seen.remove(name);
                return Ok(());
            }
            for v in map.values_mut() {
                inline_refs(v, defs, seen)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                inline_refs(item, defs, seen)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
