//! Chat File (spec §3, §6.4): a named artifact attached to a chat that a later tool
//! call can overwrite in place, e.g. a strategy's working config or a generated CSV.
//!
//! Upsert is idempotent on `(chat_id, filename)` and bumps a `version` counter
//! (SPEC_FULL §11 item 4) so a client can tell "replaced" from "first write" without
//! diffing content.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatFile {
    pub chat_id: String,
    pub filename: String,
    pub content: String,
    pub version: u32,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ChatFileStore: Send + Sync {
    /// Creates the file at version 1, or overwrites it and increments `version`.
    async fn upsert(&self, chat_id: &str, filename: &str, content: &str) -> Result<ChatFile, EngineError>;

    async fn get(&self, chat_id: &str, filename: &str) -> Result<Option<ChatFile>, EngineError>;

    async fn list(&self, chat_id: &str) -> Result<Vec<ChatFile>, EngineError>;
}

pub struct SqliteChatFileStore {
    db_path: PathBuf,
}

impl SqliteChatFileStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS chat_files (
                chat_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                content TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (chat_id, filename)
            )
            "#,
            [],
        )
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
        Ok(Self { db_path })
    }
}

#[async_trait]
impl ChatFileStore for SqliteChatFileStore {
    async fn upsert(&self, chat_id: &str, filename: &str, content: &str) -> Result<ChatFile, EngineError> {
        let chat_id = chat_id.to_string();
        let filename = filename.to_string();
        let content = content.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            let tx = conn.transaction().map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            let prior_version: Option<u32> = tx
                .query_row(
                    "SELECT version FROM chat_files WHERE chat_id = ?1 AND filename = ?2",
                    params![chat_id, filename],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            let version = prior_version.unwrap_or(0) + 1;
            let updated_at = Utc::now();
            tx.execute(
                "INSERT INTO chat_files (chat_id, filename, content, version, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(chat_id, filename) DO UPDATE SET content = excluded.content, \
                 version = excluded.version, updated_at = excluded.updated_at",
                params![chat_id, filename, content, version, updated_at.to_rfc3339()],
            )
            .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            tx.commit().map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            Ok(ChatFile { chat_id, filename, content, version, updated_at })
        })
        .await
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
    }

    async fn get(&self, chat_id: &str, filename: &str) -> Result<Option<ChatFile>, EngineError> {
        let chat_id = chat_id.to_string();
        let filename = filename.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            conn.query_row(
                "SELECT chat_id, filename, content, version, updated_at FROM chat_files \
                 WHERE chat_id = ?1 AND filename = ?2",
                params![chat_id, filename],
                |row| {
                    let updated_at: String = row.get(4)?;
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, updated_at))
                },
            )
            .optional()
            .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
            .map(|(chat_id, filename, content, version, updated_at): (String, String, String, u32, String)| {
                Ok(ChatFile {
                    chat_id,
                    filename,
                    content,
                    version,
                    updated_at: DateTime::parse_from_rfc3339(&updated_at)
                        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
                        .with_timezone(&Utc),
                })
            })
            .transpose()
        })
        .await
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
    }

    async fn list(&self, chat_id: &str) -> Result<Vec<ChatFile>, EngineError> {
        let chat_id = chat_id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            let mut stmt = conn
                .prepare("SELECT chat_id, filename, content, version, updated_at FROM chat_files WHERE chat_id = ?1 ORDER BY filename ASC")
                .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            let rows = stmt
                .query_map(params![chat_id], |row| {
                    let updated_at: String = row.get(4)?;
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, u32>(3)?, updated_at))
                })
                .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            let mut out = Vec::new();
            for row in rows {
                let (chat_id, filename, content, version, updated_at) = row.map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
                out.push(ChatFile {
                    chat_id,
                    filename,
                    content,
                    version,
                    updated_at: DateTime::parse_from_rfc3339(&updated_at)
                        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
                        .with_timezone(&Utc),
                });
            }
            Ok(out)
        })
        .await
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
    }
}
