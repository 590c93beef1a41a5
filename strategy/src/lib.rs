//! # strategy
//!
//! Durable, per-user trading bots defined by user-supplied entry/exit code (spec
//! §1 item 3, C9-C12). A [`loader::StrategyLoader`] fetches and validates a
//! strategy's code through [`sandbox::Sandbox`]; a [`executor::StrategyExecutor`]
//! runs one cycle at a time, consulting [`capital_guard`] before every entry; a
//! [`scheduler::StrategyScheduler`] decides which strategies are due and gates the
//! paper-to-live mode transition.

pub mod capital_guard;
pub mod error;
pub mod execution_log;
pub mod executor;
pub mod loader;
pub mod model;
pub mod platform;
pub mod scheduler;
pub mod store;

pub use error::{CapitalGuardReject, StrategyError};
pub use execution_log::{ExecutionLog, ExecutionRecord, ExecutionStatus, ExecutorAction, InMemoryExecutionLog};
pub use executor::StrategyExecutor;
pub use loader::{StrategyBundle, StrategyFileConfig, StrategyLoader};
pub use model::{Capital, FileRefs, Mode, SizingMethod, Stats, Strategy};
pub use platform::{Activity, OrderAck, OrderParams, PlatformClient};
pub use scheduler::StrategyScheduler;
pub use store::{SqliteStrategyStore, StrategyStore};
