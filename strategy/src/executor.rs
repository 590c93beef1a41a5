//! Strategy Executor (spec §4.10, C10): one cycle for one strategy. Steps 1-7 are
//! implemented in the order the spec lists them; a sandbox or platform failure at
//! any step aborts the rest of the cycle and is recorded as `status: failed` rather
//! than propagated, since "the next scheduler tick re-attempts" (spec §4.10
//! "Retries").

use std::sync::Arc;
use std::time::Instant;

use engine::Clock;
use sandbox::{EntrySignal, Sandbox, StrategyContext};

use crate::capital_guard;
use crate::error::StrategyError;
use crate::execution_log::{ExecutionLog, ExecutionRecord, ExecutionStatus, ExecutorAction};
use crate::loader::StrategyLoader;
use crate::model::Strategy;
use crate::platform::{OrderParams, PlatformClient};
use crate::store::StrategyStore;

pub struct StrategyExecutor {
    loader: Arc<StrategyLoader>,
    sandbox: Arc<Sandbox>,
    platform: Arc<dyn PlatformClient>,
    store: Arc<dyn StrategyStore>,
    execution_log: Arc<dyn ExecutionLog>,
    clock: Arc<dyn Clock>,
}

impl StrategyExecutor {
    pub fn new(
        loader: Arc<StrategyLoader>,
        sandbox: Arc<Sandbox>,
        platform: Arc<dyn PlatformClient>,
        store: Arc<dyn StrategyStore>,
        execution_log: Arc<dyn ExecutionLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { loader, sandbox, platform, store, execution_log, clock }
    }

    /// Runs one cycle. `dry_run = true` replaces every order submission with a
    /// no-op that still records the intended action (spec §4.10 "Dry-run mode").
    pub async fn run_cycle(&self, strategy_id: &str, dry_run: bool) -> Result<ExecutionRecord, StrategyError> {
        let started = Instant::now();
        let mut logs = Vec::new();
        let mut strategy = self.store.get(strategy_id).await?;

        // Step 1: load bundle.
        let bundle = match self.loader.load(&strategy).await {
            Ok(bundle) => bundle,
            Err(e) => return Ok(self.failed(&strategy, &e.to_string(), logs, started).await),
        };

        // Step 2: read open positions.
        let positions = match self.platform.get_positions(strategy_id).await {
            Ok(positions) => positions,
            Err(e) => return Ok(self.failed(&strategy, &e, logs, started).await),
        };
        logs.push(format!("{} open position(s)", positions.len()));

        let ctx = StrategyContext { now: self.clock.now(), market_data: serde_json::json!({}) };
        let mut actions = Vec::new();

        // Step 3: evaluate exits.
        for position in &positions {
            let exit_signal = match self.sandbox.call_exit(bundle.exit_ast.clone(), ctx.clone(), position.clone()).await {
                Ok(signal) => signal,
                Err(e) => {
                    return Ok(self
                        .failed(&strategy, &format!("exit_fn failed for position {}: {e}", position.position_id), logs, started)
                        .await)
                }
            };
            if let Some(signal) = exit_signal {
                let order_id = if dry_run {
                    None
                } else {
                    match self
                        .platform
                        .submit_order(OrderParams {
                            strategy_id: strategy.id.clone(),
                            market_id: position.market_id.clone(),
                            side: "exit".into(),
                            size: position.size,
                        })
                        .await
                    {
                        Ok(ack) => Some(ack.order_id),
                        Err(e) => return Ok(self.failed(&strategy, &format!("exit order failed: {e}"), logs, started).await),
                    }
                };
                strategy.stats.trades += 1;
                if position.unrealized_pnl >= 0.0 {
                    strategy.stats.wins += 1;
                } else {
                    strategy.stats.losses += 1;
                }
                strategy.stats.record_realized_pnl(position.unrealized_pnl, self.clock.now());
                strategy.stats.current_positions = strategy.stats.current_positions.saturating_sub(1);
                strategy.stats.deployed_capital = (strategy.stats.deployed_capital - position.size).max(0.0);
                actions.push(ExecutorAction::Exited { signal, order_id });
            }
        }

        // Step 4: evaluate entries.
        let mut entry_signals: Vec<EntrySignal> = match self.sandbox.call_entry(bundle.entry_ast.clone(), ctx.clone()).await {
            Ok(signals) => signals,
            Err(e) => return Ok(self.failed(&strategy, &format!("entry_fn failed: {e}"), logs, started).await),
        };
        entry_signals.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));

        // Step 5: Capital Guard, then submit (or simulate).
        for signal in entry_signals {
            match capital_guard::evaluate(&strategy.capital, &strategy.stats, strategy.mode, strategy.approved, &signal) {
                Ok(size) => {
                    let order_id = if dry_run {
                        None
                    } else {
                        match self
                            .platform
                            .submit_order(OrderParams {
                                strategy_id: strategy.id.clone(),
                                market_id: signal.market_id.clone(),
                                side: signal.side.clone(),
                                size,
                            })
                            .await
                        {
                            Ok(ack) => Some(ack.order_id),
                            Err(e) => return Ok(self.failed(&strategy, &format!("entry order failed: {e}"), logs, started).await),
                        }
                    };
                    strategy.stats.current_positions += 1;
                    strategy.stats.deployed_capital += size;
                    actions.push(ExecutorAction::Entered { signal, size, order_id });
                }
                Err(reject) => {
                    actions.push(ExecutorAction::Skipped { signal, reason: reject.to_string() });
                }
            }
        }

        // Step 6: finalize stats, step 7: record.
        strategy.stats.last_run_at = Some(self.clock.now());
        self.store.put(&strategy).await?;

        let record = ExecutionRecord {
            strategy_id: strategy.id.clone(),
            status: ExecutionStatus::Success,
            mode: strategy.mode,
            error: None,
            actions,
            logs,
            duration_ms: started.elapsed().as_millis() as u64,
            recorded_at: self.clock.now(),
        };
        self.execution_log.record(record.clone()).await;
        Ok(record)
    }

    async fn failed(&self, strategy: &Strategy, error: &str, logs: Vec<String>, started: Instant) -> ExecutionRecord {
        let record = ExecutionRecord {
            strategy_id: strategy.id.clone(),
            status: ExecutionStatus::Failed,
            mode: strategy.mode,
            error: Some(error.to_string()),
            actions: vec![],
            logs,
            duration_ms: started.elapsed().as_millis() as u64,
            recorded_at: self.clock.now(),
        };
        self.execution_log.record(record.clone()).await;
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_log::InMemoryExecutionLog;
    use crate::model::{Capital, FileRefs, Mode, SizingMethod, Stats};
    use crate::store::SqliteStrategyStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use engine::{ChatFileStore, FakeClock, SqliteChatFileStore};
    use sandbox::Position;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakePlatform {
        positions: Mutex<Vec<Position>>,
        orders: Mutex<Vec<OrderParams>>,
    }

    #[async_trait]
    impl PlatformClient for FakePlatform {
        async fn get_positions(&self, _strategy_id: &str) -> Result<Vec<Position>, String> {
            Ok(self.positions.lock().unwrap().clone())
        }

        async fn submit_order(&self, params: OrderParams) -> Result<crate::platform::OrderAck, String> {
            self.orders.lock().unwrap().push(params);
            Ok(crate::platform::OrderAck { order_id: "ord-1".into(), filled: true, fill_price: Some(1.0) })
        }

        async fn get_activities(&self, _user_id: &str, _account: &str, _start: chrono::DateTime<Utc>, _end: chrono::DateTime<Utc>) -> Result<Vec<crate::platform::Activity>, String> {
            Ok(vec![])
        }
    }

    fn strategy() -> Strategy {
        Strategy {
            id: "s1".into(),
            user_id: "u1".into(),
            chat_id: "c1".into(),
            name: "momentum".into(),
            thesis: "buy the dip".into(),
            platform: "alpaca".into(),
            execution_frequency_seconds: 300,
            capital: Capital { total: 1000.0, per_trade: 100.0, max_positions: 5, max_daily_loss: 200.0, sizing_method: SizingMethod::Fixed },
            parameters: serde_json::json!({}),
            file_ids: FileRefs { entry: "entry.rhai".into(), exit: "exit.rhai".into(), config: "config.json".into() },
            mode: Mode::Paper,
            enabled: true,
            approved: true,
            stats: Stats::default(),
        }
    }

    async fn setup(entry_src: &str, exit_src: &str, positions: Vec<Position>) -> (StrategyExecutor, Arc<FakePlatform>) {
        let chat_file = tempfile::NamedTempFile::new().unwrap();
        let chat_files = Arc::new(SqliteChatFileStore::new(chat_file.path()).unwrap());
        chat_files.upsert("c1", "entry.rhai", entry_src).await.unwrap();
        chat_files.upsert("c1", "exit.rhai", exit_src).await.unwrap();
        chat_files
            .upsert(
                "c1",
                "config.json",
                &serde_json::json!({
                    "name": "momentum", "thesis": "buy the dip", "platform": "alpaca",
                    "execution_frequency_seconds": 300, "entry_description": "d", "exit_description": "d",
                    "capital": {"total": 1000.0, "per_trade": 100.0, "max_positions": 5, "max_daily_loss": 200.0, "sizing_method": "fixed"},
                    "parameters": {}, "mode": "paper",
                })
                .to_string(),
            )
            .await
            .unwrap();

        let sandbox = Arc::new(Sandbox::new(Duration::from_secs(5)));
        let loader = Arc::new(StrategyLoader::new(chat_files, sandbox.clone()));
        let platform = Arc::new(FakePlatform { positions: Mutex::new(positions), orders: Mutex::new(vec![]) });
        let strategy_file = tempfile::NamedTempFile::new().unwrap();
        let store = Arc::new(SqliteStrategyStore::new(strategy_file.path()).unwrap());
        store.put(&strategy()).await.unwrap();
        let execution_log = Arc::new(InMemoryExecutionLog::new(10));
        let clock = FakeClock::new(Utc::now());

        (StrategyExecutor::new(loader, sandbox, platform.clone(), store, execution_log, clock), platform)
    }

    #[tokio::test]
    async fn entry_signal_is_submitted_and_recorded() {
        let (executor, platform) = setup(
            r#"fn entry(ctx) { [#{ market_id: "AAPL", side: "buy", reason: "momentum", confidence: 0.9 }] }"#,
            "fn exit(ctx, position) { () }",
            vec![],
        )
        .await;
        let record = executor.run_cycle("s1", false).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Success);
        assert_eq!(record.actions.len(), 1);
        assert!(matches!(&record.actions[0], ExecutorAction::Entered { .. }));
        assert_eq!(platform.orders.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_records_without_submitting_orders() {
        let (executor, platform) = setup(
            r#"fn entry(ctx) { [#{ market_id: "AAPL", side: "buy", reason: "momentum", confidence: 0.9 }] }"#,
            "fn exit(ctx, position) { () }",
            vec![],
        )
        .await;
        let record = executor.run_cycle("s1", true).await.unwrap();
        assert_eq!(record.actions.len(), 1);
        assert!(platform.orders.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exit_signal_closes_a_position_and_updates_pnl() {
        let position = Position { position_id: "p1".into(), market_id: "AAPL".into(), side: "buy".into(), size: 100.0, entry_price: 10.0, unrealized_pnl: 25.0 };
        let (executor, _platform) = setup(
            "fn entry(ctx) { [] }",
            r#"fn exit(ctx, position) { #{ position_id: position.position_id, reason: "target hit" } }"#,
            vec![position],
        )
        .await;
        let record = executor.run_cycle("s1", false).await.unwrap();
        assert!(matches!(&record.actions[0], ExecutorAction::Exited { .. }));
    }

    #[tokio::test]
    async fn sandbox_failure_aborts_the_cycle_with_failed_status() {
        let (executor, _platform) = setup("fn entry(ctx) { 42 }", "fn exit(ctx, position) { () }", vec![]).await;
        let record = executor.run_cycle("s1", false).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.error.is_some());
    }

    #[tokio::test]
    async fn capital_guard_rejection_is_recorded_as_skipped_not_failed() {
        let chat_file = tempfile::NamedTempFile::new().unwrap();
        let chat_files = Arc::new(SqliteChatFileStore::new(chat_file.path()).unwrap());
        chat_files
            .upsert("c1", "entry.rhai", r#"fn entry(ctx) { [#{ market_id: "AAPL", side: "buy", reason: "momentum", confidence: 0.9 }] }"#)
            .await
            .unwrap();
        chat_files.upsert("c1", "exit.rhai", "fn exit(ctx, position) { () }").await.unwrap();
        chat_files
            .upsert(
                "c1",
                "config.json",
                &serde_json::json!({
                    "name": "momentum", "thesis": "buy the dip", "platform": "alpaca",
                    "execution_frequency_seconds": 300, "entry_description": "d", "exit_description": "d",
                    "capital": {"total": 1000.0, "per_trade": 100.0, "max_positions": 5, "max_daily_loss": 200.0, "sizing_method": "fixed"},
                    "parameters": {}, "mode": "paper",
                })
                .to_string(),
            )
            .await
            .unwrap();
        let sandbox = Arc::new(Sandbox::new(Duration::from_secs(5)));
        let loader = Arc::new(StrategyLoader::new(chat_files, sandbox.clone()));
        let platform = Arc::new(FakePlatform { positions: Mutex::new(vec![]), orders: Mutex::new(vec![]) });
        let strategy_file = tempfile::NamedTempFile::new().unwrap();
        let store = Arc::new(SqliteStrategyStore::new(strategy_file.path()).unwrap());
        let mut s = strategy();
        s.stats.current_positions = 5;
        store.put(&s).await.unwrap();
        let execution_log = Arc::new(InMemoryExecutionLog::new(10));
        let clock = FakeClock::new(Utc::now());
        let executor = StrategyExecutor::new(loader, sandbox, platform, store, execution_log, clock);

        let record = executor.run_cycle("s1", false).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Success);
        assert!(matches!(&record.actions[0], ExecutorAction::Skipped { .. }));
    }

    #[tokio::test]
    async fn losing_streak_trips_the_daily_loss_limit() {
        let position =
            Position { position_id: "p1".into(), market_id: "AAPL".into(), side: "buy".into(), size: 100.0, entry_price: 10.0, unrealized_pnl: -60.0 };
        let chat_file = tempfile::NamedTempFile::new().unwrap();
        let chat_files = Arc::new(SqliteChatFileStore::new(chat_file.path()).unwrap());
        chat_files
            .upsert("c1", "entry.rhai", r#"fn entry(ctx) { [#{ market_id: "AAPL", side: "buy", reason: "momentum", confidence: 0.9 }] }"#)
            .await
            .unwrap();
        chat_files
            .upsert("c1", "exit.rhai", r#"fn exit(ctx, position) { #{ position_id: position.position_id, reason: "stop loss" } }"#)
            .await
            .unwrap();
        chat_files
            .upsert(
                "c1",
                "config.json",
                &serde_json::json!({
                    "name": "momentum", "thesis": "buy the dip", "platform": "alpaca",
                    "execution_frequency_seconds": 300, "entry_description": "d", "exit_description": "d",
                    "capital": {"total": 1000.0, "per_trade": 100.0, "max_positions": 5, "max_daily_loss": 100.0, "sizing_method": "fixed"},
                    "parameters": {}, "mode": "paper",
                })
                .to_string(),
            )
            .await
            .unwrap();
        let sandbox = Arc::new(Sandbox::new(Duration::from_secs(5)));
        let loader = Arc::new(StrategyLoader::new(chat_files, sandbox.clone()));
        let platform = Arc::new(FakePlatform { positions: Mutex::new(vec![position]), orders: Mutex::new(vec![]) });
        let strategy_file = tempfile::NamedTempFile::new().unwrap();
        let store = Arc::new(SqliteStrategyStore::new(strategy_file.path()).unwrap());
        let mut s = strategy();
        s.capital.max_daily_loss = 100.0;
        store.put(&s).await.unwrap();
        let execution_log = Arc::new(InMemoryExecutionLog::new(10));
        let clock = FakeClock::new(Utc::now());
        let executor = StrategyExecutor::new(loader, sandbox, platform, store.clone(), execution_log, clock);

        // First cycle: one realized loss of 60 leaves daily_loss under the 100 cap, so
        // the proposed entry still goes through.
        let first = executor.run_cycle("s1", false).await.unwrap();
        assert!(matches!(&first.actions[1], ExecutorAction::Entered { .. }), "actions: {:?}", first.actions);

        // Second cycle: another realized loss of 60 pushes daily_loss to 120, past the
        // 100 cap, so this cycle's entry is rejected instead of submitted.
        let second = executor.run_cycle("s1", false).await.unwrap();
        assert!(
            matches!(&second.actions[1], ExecutorAction::Skipped { reason, .. } if reason == "daily loss limit reached"),
            "actions: {:?}",
            second.actions
        );

        let persisted = store.get("s1").await.unwrap();
        assert!(persisted.stats.daily_loss >= 100.0);
    }
}
