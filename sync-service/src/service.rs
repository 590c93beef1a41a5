//! Sync Service (spec §4.6, C6): a freshness-aware cache keyed per user, generic
//! over whatever upstream pull the caller wires in. Adapted from `loom`'s
//! `CachedResolver<R>` (`model_spec/cached.rs`) — same "wrap any inner fetcher with
//! an in-memory cache" shape — generalized from a single cached value per key to a
//! three-mode freshness automaton with single-flight background refresh.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config::RuntimeConfig;
use engine::Clock;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::error::SyncError;

/// Upstream collaborator this service fronts (spec §6.5's broker/platform
/// `get_activities`, generalized: the Sync Service doesn't care what `Item` is).
#[async_trait]
pub trait ActivitySource: Send + Sync {
    type Item: Clone + Send + Sync + 'static;

    async fn fetch(&self, user_id: &str) -> Result<Vec<Self::Item>, String>;
}

/// Result descriptor returned to every caller (spec §4.6).
#[derive(Clone, Debug, Serialize)]
pub struct SyncResult<T> {
    pub data: Vec<T>,
    pub staleness_seconds: i64,
    pub background_sync_triggered: bool,
    pub cached: bool,
}

struct CachedEntry<T> {
    data: Vec<T>,
    last_sync_at: Option<DateTime<Utc>>,
}

/// Per-user state (spec §3 `SyncState`). `refresh_lock` is what makes concurrent
/// Very-Stale callers coalesce onto one fetch; `in_flight` is the background-refresh
/// guard for Stale-Background mode. They're deliberately separate: a foreground
/// caller waiting on `refresh_lock` is a different thing from a background task
/// already running.
struct UserState<T> {
    cached: RwLock<CachedEntry<T>>,
    in_flight: AtomicBool,
    refresh_lock: Mutex<()>,
}

impl<T> Default for UserState<T> {
    fn default() -> Self {
        Self {
            cached: RwLock::new(CachedEntry { data: Vec::new(), last_sync_at: None }),
            in_flight: AtomicBool::new(false),
            refresh_lock: Mutex::new(()),
        }
    }
}

pub struct SyncService<S: ActivitySource> {
    source: Arc<S>,
    runtime: Arc<RuntimeConfig>,
    clock: Arc<dyn Clock>,
    users: RwLock<HashMap<String, Arc<UserState<S::Item>>>>,
}

impl<S: ActivitySource + 'static> SyncService<S> {
    pub fn new(source: Arc<S>, runtime: Arc<RuntimeConfig>, clock: Arc<dyn Clock>) -> Self {
        Self { source, runtime, clock, users: RwLock::new(HashMap::new()) }
    }

    async fn state_for(&self, user_id: &str) -> Arc<UserState<S::Item>> {
        if let Some(state) = self.users.read().await.get(user_id) {
            return state.clone();
        }
        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_insert_with(|| Arc::new(UserState::default())).clone()
    }

    /// Sync Service entry point (spec §4.6). `force` always performs a blocking
    /// full refresh, per the Very-Stale row's "or `force`" clause.
    pub async fn sync(&self, user_id: &str, force: bool) -> Result<SyncResult<S::Item>, SyncError> {
        let state = self.state_for(user_id).await;
        let now = self.clock.now();
        let (data, last_sync_at) = self.snapshot(&state).await;
        let staleness = staleness_of(last_sync_at, now);

        if force || last_sync_at.is_none() || staleness >= self.runtime.sync_hard.as_secs() as i64 {
            return self.refresh_foreground(user_id, &state, force).await;
        }
        if staleness >= self.runtime.sync_cooldown.as_secs() as i64 {
            let triggered = self.maybe_spawn_background_refresh(user_id, &state);
            return Ok(SyncResult { data, staleness_seconds: staleness, background_sync_triggered: triggered, cached: true });
        }
        Ok(SyncResult { data, staleness_seconds: staleness, background_sync_triggered: false, cached: true })
    }

    async fn snapshot(&self, state: &Arc<UserState<S::Item>>) -> (Vec<S::Item>, Option<DateTime<Utc>>) {
        let entry = state.cached.read().await;
        (entry.data.clone(), entry.last_sync_at)
    }

    /// Very-Stale mode: block on the per-user refresh lock (spec §4.6 single-flight).
    /// A waiter that acquires the lock after someone else already refreshed sees the
    /// updated cache and skips its own fetch — that's the coalescing.
    async fn refresh_foreground(&self, user_id: &str, state: &Arc<UserState<S::Item>>, force: bool) -> Result<SyncResult<S::Item>, SyncError> {
        let _guard = state.refresh_lock.lock().await;
        if !force {
            let now = self.clock.now();
            let (data, last_sync_at) = self.snapshot(state).await;
            let staleness = staleness_of(last_sync_at, now);
            if last_sync_at.is_some() && staleness < self.runtime.sync_hard.as_secs() as i64 {
                return Ok(SyncResult { data, staleness_seconds: staleness, background_sync_triggered: false, cached: true });
            }
        }
        let fetched = self
            .source
            .fetch(user_id)
            .await
            .map_err(|reason| SyncError::ForegroundRefreshFailed { user_id: user_id.to_string(), reason })?;
        let synced_at = self.clock.now();
        {
            let mut entry = state.cached.write().await;
            entry.data = fetched.clone();
            entry.last_sync_at = Some(synced_at);
        }
        Ok(SyncResult { data: fetched, staleness_seconds: 0, background_sync_triggered: false, cached: false })
    }

    /// Stale-Background mode: spawns a refresh if one isn't already running for this
    /// user (spec §4.6 `in_flight` guard). Background failures are logged, never
    /// surfaced (spec §7 `SyncBackgroundFailed`).
    fn maybe_spawn_background_refresh(&self, user_id: &str, state: &Arc<UserState<S::Item>>) -> bool {
        if state.in_flight.swap(true, Ordering::SeqCst) {
            return false;
        }
        let source = self.source.clone();
        let clock = self.clock.clone();
        let state = state.clone();
        let user_id = user_id.to_string();
        tokio::spawn(async move {
            match source.fetch(&user_id).await {
                Ok(fetched) => {
                    let mut entry = state.cached.write().await;
                    entry.data = fetched;
                    entry.last_sync_at = Some(clock.now());
                }
                Err(reason) => {
                    tracing::warn!(user_id = %user_id, error = %reason, "background sync failed");
                }
            }
            state.in_flight.store(false, Ordering::SeqCst);
        });
        true
    }
}

fn staleness_of(last_sync_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match last_sync_at {
        Some(t) => (now - t).num_seconds(),
        None => i64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::FakeClock;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    struct Activity {
        id: String,
    }

    struct CountingSource {
        calls: AtomicUsize,
        items: Vec<Activity>,
    }

    #[async_trait]
    impl ActivitySource for CountingSource {
        type Item = Activity;

        async fn fetch(&self, _user_id: &str) -> Result<Vec<Activity>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.clone())
        }
    }

    fn runtime() -> Arc<RuntimeConfig> {
        Arc::new(RuntimeConfig {
            sync_cooldown: Duration::from_secs(300),
            sync_hard: Duration::from_secs(3600),
            max_turns: 10,
            tool_timeout: Duration::from_secs(60),
            strategy_cycle_timeout: Duration::from_secs(30),
            sandbox_timeout: Duration::from_secs(5),
            scheduler_tick: Duration::from_secs(5),
            scheduler_workers: 8,
            max_subagent_depth: 1,
        })
    }

    #[tokio::test]
    async fn first_call_is_very_stale_and_blocks() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), items: vec![Activity { id: "a1".into() }] });
        let clock = FakeClock::new(Utc::now());
        let svc = SyncService::new(source.clone(), runtime(), clock);
        let result = svc.sync("u1", false).await.unwrap();
        assert!(!result.cached);
        assert_eq!(result.data.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_call_returns_cached_without_fetching_again() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), items: vec![Activity { id: "a1".into() }] });
        let clock = FakeClock::new(Utc::now());
        let svc = SyncService::new(source.clone(), runtime(), clock);
        svc.sync("u1", false).await.unwrap();
        let result = svc.sync("u1", false).await.unwrap();
        assert!(result.cached);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_background_mode_returns_cached_and_triggers_one_refresh() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), items: vec![Activity { id: "a1".into() }] });
        let clock = FakeClock::new(Utc::now());
        let svc = Arc::new(SyncService::new(source.clone(), runtime(), clock.clone()));
        svc.sync("u1", false).await.unwrap();
        clock.advance(chrono::Duration::seconds(400));

        let result = svc.sync("u1", false).await.unwrap();
        assert!(result.cached);
        assert!(result.background_sync_triggered);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn force_always_performs_a_blocking_refresh() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), items: vec![Activity { id: "a1".into() }] });
        let clock = FakeClock::new(Utc::now());
        let svc = SyncService::new(source.clone(), runtime(), clock);
        svc.sync("u1", false).await.unwrap();
        let result = svc.sync("u1", true).await.unwrap();
        assert!(!result.cached);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn very_stale_after_hard_cutoff_blocks_again() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), items: vec![Activity { id: "a1".into() }] });
        let clock = FakeClock::new(Utc::now());
        let svc = SyncService::new(source.clone(), runtime(), clock.clone());
        svc.sync("u1", false).await.unwrap();
        clock.advance(chrono::Duration::seconds(4000));
        let result = svc.sync("u1", false).await.unwrap();
        assert!(!result.cached);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), items: vec![Activity { id: "a1".into() }] });
        let clock = FakeClock::new(Utc::now());
        let svc = SyncService::new(source.clone(), runtime(), clock);
        svc.sync("u1", false).await.unwrap();
        svc.sync("u2", false).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
