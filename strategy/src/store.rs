//! Strategy persistence. Spec §5: "mutations to `enabled/approved/config/mode`
//! happen only via API and MUST be read-after-write visible to the next scheduler
//! tick" — a SQLite row per strategy, `enabled`/`approved` broken out as indexed
//! columns for the Scheduler's query, the rest serialized as JSON. Adapted from
//! [`engine::chat::file::SqliteChatFileStore`]'s connection-per-call-under-
//! `spawn_blocking` shape.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::error::StrategyError;
use crate::model::Strategy;

#[async_trait]
pub trait StrategyStore: Send + Sync {
    async fn get(&self, strategy_id: &str) -> Result<Strategy, StrategyError>;
    async fn put(&self, strategy: &Strategy) -> Result<(), StrategyError>;
    /// Strategies the Scheduler should consider this tick (spec §4.11 step 1).
    async fn due_candidates(&self) -> Result<Vec<Strategy>, StrategyError>;
}

pub struct SqliteStrategyStore {
    db_path: PathBuf,
}

impl SqliteStrategyStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StrategyError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = rusqlite::Connection::open(&db_path).map_err(|e| StrategyError::StoreError(e.to_string()))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS strategies (
                id TEXT PRIMARY KEY,
                enabled INTEGER NOT NULL,
                approved INTEGER NOT NULL,
                data TEXT NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| StrategyError::StoreError(e.to_string()))?;
        Ok(Self { db_path })
    }
}

#[async_trait]
impl StrategyStore for SqliteStrategyStore {
    async fn get(&self, strategy_id: &str) -> Result<Strategy, StrategyError> {
        let id = strategy_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path).map_err(|e| StrategyError::StoreError(e.to_string()))?;
            let data: Option<String> = conn
                .query_row("SELECT data FROM strategies WHERE id = ?1", params![id], |row| row.get(0))
                .optional()
                .map_err(|e| StrategyError::StoreError(e.to_string()))?;
            match data {
                Some(data) => serde_json::from_str(&data).map_err(|e| StrategyError::StoreError(e.to_string())),
                None => Err(StrategyError::NotFound(id)),
            }
        })
        .await
        .map_err(|e| StrategyError::StoreError(e.to_string()))?
    }

    async fn put(&self, strategy: &Strategy) -> Result<(), StrategyError> {
        let id = strategy.id.clone();
        let enabled = strategy.enabled;
        let approved = strategy.approved;
        let data = serde_json::to_string(strategy).map_err(|e| StrategyError::StoreError(e.to_string()))?;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path).map_err(|e| StrategyError::StoreError(e.to_string()))?;
            conn.execute(
                "INSERT INTO strategies (id, enabled, approved, data) VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(id) DO UPDATE SET enabled = excluded.enabled, approved = excluded.approved, data = excluded.data",
                params![id, enabled, approved, data],
            )
            .map_err(|e| StrategyError::StoreError(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StrategyError::StoreError(e.to_string()))?
    }

    async fn due_candidates(&self) -> Result<Vec<Strategy>, StrategyError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path).map_err(|e| StrategyError::StoreError(e.to_string()))?;
            let mut stmt = conn
                .prepare("SELECT data FROM strategies WHERE enabled = 1 AND approved = 1")
                .map_err(|e| StrategyError::StoreError(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| StrategyError::StoreError(e.to_string()))?;
            let mut out = Vec::new();
            for row in rows {
                let data = row.map_err(|e| StrategyError::StoreError(e.to_string()))?;
                out.push(serde_json::from_str(&data).map_err(|e| StrategyError::StoreError(e.to_string()))?);
            }
            Ok(out)
        })
        .await
        .map_err(|e| StrategyError::StoreError(e.to_string()))?
    }
}
