//! Agent Loop and Sub-Agent Delegation (spec §4.7, §4.8, C7/C8).

pub mod loop_;
pub mod subagent;

pub use loop_::{AgentLoop, TurnRequest};
pub use subagent::SubAgentTool;
