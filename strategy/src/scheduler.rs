//! Strategy Scheduler (spec §4.11, C11): a background tick loop that dispatches due
//! strategies onto a bounded worker pool, one Executor cycle each, serialized per
//! strategy. Also owns the graduation gate on `mode = live` writes.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use config::RuntimeConfig;
use engine::Clock;
use tokio::sync::Semaphore;

use crate::error::StrategyError;
use crate::executor::StrategyExecutor;
use crate::model::{Mode, Strategy};
use crate::store::StrategyStore;

/// Groups `candidates` by `user_id` and interleaves them round-robin (one per user
/// per round, user order fixed by `user_id` for determinism) instead of leaving
/// them in whatever order the store returned.
fn round_robin_by_user(candidates: Vec<Strategy>) -> Vec<Strategy> {
    let mut by_user: BTreeMap<String, VecDeque<Strategy>> = BTreeMap::new();
    for candidate in candidates {
        by_user.entry(candidate.user_id.clone()).or_default().push_back(candidate);
    }
    let mut ordered = Vec::new();
    loop {
        let mut dispatched_any = false;
        for queue in by_user.values_mut() {
            if let Some(candidate) = queue.pop_front() {
                ordered.push(candidate);
                dispatched_any = true;
            }
        }
        if !dispatched_any {
            break;
        }
    }
    ordered
}

pub struct StrategyScheduler {
    store: Arc<dyn StrategyStore>,
    executor: Arc<StrategyExecutor>,
    runtime: Arc<RuntimeConfig>,
    clock: Arc<dyn Clock>,
    workers: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl StrategyScheduler {
    pub fn new(store: Arc<dyn StrategyStore>, executor: Arc<StrategyExecutor>, runtime: Arc<RuntimeConfig>, clock: Arc<dyn Clock>) -> Self {
        let workers = Arc::new(Semaphore::new(runtime.scheduler_workers));
        Self { store, executor, runtime, clock, workers, in_flight: Arc::new(Mutex::new(HashSet::new())) }
    }

    /// Runs the tick loop until `cancel` is dropped or signaled. A caller typically
    /// spawns this as its own task.
    pub async fn run(&self, cancel: engine::CancelToken) {
        let mut interval = tokio::time::interval(self.runtime.scheduler_tick);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = cancel.cancelled() => break,
            }
        }
    }

    /// One scheduling pass (spec §4.11 steps 1-4): query eligible strategies, check
    /// which are due, dispatch the due ones onto the worker pool, skipping any
    /// strategy whose previous cycle hasn't finished yet. Due candidates are
    /// interleaved round-robin across `user_id` (spec §4.11 "Fairness: round-robin
    /// across users when worker pool is saturated") before permits are acquired, so
    /// a user with many due strategies can't claim every slot ahead of other users.
    pub async fn tick(&self) {
        let candidates = match self.store.due_candidates().await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "scheduler: failed to query due candidates");
                return;
            }
        };
        let now = self.clock.now();
        let due = candidates.into_iter().filter(|s| s.is_due(now)).collect();
        for strategy in round_robin_by_user(due) {
            let strategy_id = strategy.id.clone();
            {
                let mut in_flight = self.in_flight.lock().unwrap();
                if in_flight.contains(&strategy_id) {
                    continue;
                }
                in_flight.insert(strategy_id.clone());
            }
            let permit = self.workers.clone().acquire_owned().await.expect("semaphore never closed");
            let executor = self.executor.clone();
            let in_flight = self.in_flight.clone();
            let id_for_task = strategy_id.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = executor.run_cycle(&id_for_task, false).await {
                    tracing::warn!(strategy_id = %id_for_task, error = %e, "strategy cycle failed");
                }
                in_flight.lock().unwrap().remove(&id_for_task);
            });
        }
    }

    /// Graduation gate (spec §4.11): the scheduler — not the Capital Guard, not the
    /// API layer — is the sole place a `mode = live` write is accepted or refused.
    pub async fn request_mode_change(&self, strategy_id: &str, new_mode: Mode) -> Result<(), StrategyError> {
        let mut strategy = self.store.get(strategy_id).await?;
        if new_mode == Mode::Live && !strategy.meets_graduation_criteria() {
            return Err(StrategyError::GraduationNotMet(strategy_id.to_string()));
        }
        strategy.mode = new_mode;
        self.store.put(&strategy).await
    }
}
