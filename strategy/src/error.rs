//! Strategy-runtime error taxonomy (spec §7, SPEC_FULL §10.2): distinct from
//! [`sandbox::SandboxError`] — that's what a single script call can do wrong; this is
//! what a whole strategy cycle or mode transition can do wrong.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("strategy {0} not found")]
    NotFound(String),
    #[error("failed to load strategy {strategy_id}: {reason}")]
    LoadFailed { strategy_id: String, reason: String },
    #[error("sandbox error running {function} for strategy {strategy_id}: {source}")]
    Sandbox {
        strategy_id: String,
        function: &'static str,
        #[source]
        source: sandbox::SandboxError,
    },
    #[error("strategy {strategy_id} cycle exceeded its {timeout_secs}s budget")]
    CycleTimeout { strategy_id: String, timeout_secs: u64 },
    #[error("platform client error: {0}")]
    PlatformError(String),
    #[error("strategy {0} refuses mode=live: graduation criteria not met")]
    GraduationNotMet(String),
    #[error("store error: {0}")]
    StoreError(String),
    #[error("config error: {0}")]
    ConfigError(String),
}

impl StrategyError {
    pub fn kind(&self) -> &'static str {
        match self {
            StrategyError::NotFound(_) => "strategy_not_found",
            StrategyError::LoadFailed { .. } => "strategy_load_failed",
            StrategyError::Sandbox { .. } => "sandbox_error",
            StrategyError::CycleTimeout { .. } => "strategy_cycle_timeout",
            StrategyError::PlatformError(_) => "platform_error",
            StrategyError::GraduationNotMet(_) => "graduation_not_met",
            StrategyError::StoreError(_) => "store_error",
            StrategyError::ConfigError(_) => "config_error",
        }
    }
}

/// Why a proposed entry was skipped (spec §4.12, §7: `CapitalGuardReject` is not an
/// error, just a recorded reason).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapitalGuardReject {
    MaxPositionsReached,
    CapitalExhausted,
    DailyLossLimitReached,
    LiveModeNotApproved,
}

impl std::fmt::Display for CapitalGuardReject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            CapitalGuardReject::MaxPositionsReached => "max open positions reached",
            CapitalGuardReject::CapitalExhausted => "deployed capital would exceed total",
            CapitalGuardReject::DailyLossLimitReached => "daily loss limit reached",
            CapitalGuardReject::LiveModeNotApproved => "live mode requires approval",
        };
        write!(f, "{msg}")
    }
}
