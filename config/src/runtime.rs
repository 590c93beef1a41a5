//! Typed runtime knobs (spec §6.6), read once at process start.

use std::env;
use std::time::Duration;

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Every tunable the engine, sandbox, and scheduler read from the environment.
///
/// Built once via [`RuntimeConfig::from_env`] and threaded through call sites as
/// `Arc<RuntimeConfig>`. Unknown or unparsable values fall back to the documented default
/// rather than failing the process.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub sync_cooldown: Duration,
    pub sync_hard: Duration,
    pub max_turns: u32,
    pub tool_timeout: Duration,
    pub strategy_cycle_timeout: Duration,
    pub sandbox_timeout: Duration,
    pub scheduler_tick: Duration,
    pub scheduler_workers: usize,
    /// Sub-Agent Delegation recursion ceiling (spec §4.8): a sub-agent's own tool
    /// calls run at `ctx.depth + 1`; once `depth` reaches this value, a nested
    /// `sub_agent` tool call is refused instead of spawning another inner loop.
    pub max_subagent_depth: u32,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            sync_cooldown: Duration::from_secs(env_u64("SYNC_COOLDOWN_SEC", 300)),
            sync_hard: Duration::from_secs(env_u64("SYNC_HARD_SEC", 3600)),
            max_turns: env_u64("MAX_TURNS", 10) as u32,
            tool_timeout: Duration::from_secs(env_u64("TOOL_TIMEOUT_SEC", 60)),
            strategy_cycle_timeout: Duration::from_secs(env_u64("STRATEGY_CYCLE_TIMEOUT_SEC", 30)),
            sandbox_timeout: Duration::from_secs(env_u64("SANDBOX_TIMEOUT_SEC", 5)),
            scheduler_tick: Duration::from_secs(env_u64("SCHEDULER_TICK_SEC", 5)),
            scheduler_workers: env_u64("SCHEDULER_WORKERS", 8) as usize,
            max_subagent_depth: env_u64("MAX_SUBAGENT_DEPTH", 1) as u32,
        }
    }

    /// Key-value pairs for startup logging, in the order they appear in spec §6.6.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("sync_cooldown_sec", self.sync_cooldown.as_secs().to_string()),
            ("sync_hard_sec", self.sync_hard.as_secs().to_string()),
            ("max_turns", self.max_turns.to_string()),
            ("tool_timeout_sec", self.tool_timeout.as_secs().to_string()),
            (
                "strategy_cycle_timeout_sec",
                self.strategy_cycle_timeout.as_secs().to_string(),
            ),
            ("sandbox_timeout_sec", self.sandbox_timeout.as_secs().to_string()),
            ("scheduler_tick_sec", self.scheduler_tick.as_secs().to_string()),
            ("scheduler_workers", self.scheduler_workers.to_string()),
            ("max_subagent_depth", self.max_subagent_depth.to_string()),
        ]
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
