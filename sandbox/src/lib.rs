//! # sandbox
//!
//! Constrained evaluator for user-authored strategy code (spec §4.4, C4). Strategy
//! scripts are untrusted: this crate compiles and runs them under a rhai engine with
//! `eval`/`import` disabled, resource ceilings on operations/recursion/collection
//! size, and a wall-clock deadline, coercing whatever the script returns into the
//! declared [`EntrySignal`]/[`ExitSignal`] shapes or a typed [`SandboxError`].

pub mod engine;
pub mod error;
pub mod signals;

pub use engine::Sandbox;
pub use error::SandboxError;
pub use signals::{EntrySignal, ExitSignal, Position, StrategyContext};
