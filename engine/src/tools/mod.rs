//! Tool trait, registry, and call-shape types (spec §4.2, §4.7).

pub mod registry;
pub mod schema;
pub mod spec;
mod r#trait;

pub use r#trait::Tool;
pub use registry::ToolRegistry;
pub use spec::{ToolCallContent, ToolSourceError, ToolSpec};
