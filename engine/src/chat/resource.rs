//! Resource (spec §3): an immutable artifact a tool call produced, referenced from a
//! tool-role message by id.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::context::ResourceSink;
use crate::error::EngineError;

/// A saved tool artifact — a chart, a generated report, a fetched dataset.
///
/// Immutable once created (SPEC_FULL §11 item 3 adds `content_type` so a client can
/// render without re-deriving it from `data`, e.g. `"image/png"` vs `"application/json"`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub chat_id: String,
    pub resource_type: String,
    pub content_type: String,
    pub title: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    pub fn new(
        id: impl Into<String>,
        chat_id: impl Into<String>,
        resource_type: impl Into<String>,
        content_type: impl Into<String>,
        title: impl Into<String>,
        data: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            chat_id: chat_id.into(),
            resource_type: resource_type.into(),
            content_type: content_type.into(),
            title: title.into(),
            data,
            created_at,
        }
    }
}

/// SQLite-backed resource store, used both to answer "get resource by id" reads and,
/// scoped to one chat via [`SqliteResourceStore::scoped`], as the
/// [`ResourceSink`] a tool call's [`crate::context::InvocationContext`] writes through.
pub struct SqliteResourceStore {
    db_path: PathBuf,
}

impl SqliteResourceStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS resources (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL,
                resource_type TEXT NOT NULL,
                content_type TEXT NOT NULL,
                title TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
        Ok(Self { db_path })
    }

    pub async fn get(&self, id: &str) -> Result<Option<Resource>, EngineError> {
        let id = id.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            conn.query_row(
                "SELECT id, chat_id, resource_type, content_type, title, data, created_at FROM resources WHERE id = ?1",
                params![id],
                |row| {
                    let data: String = row.get(5)?;
                    let created_at: String = row.get(6)?;
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, String>(3)?, row.get::<_, String>(4)?, data, created_at))
                },
            )
            .optional()
            .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
            .map(|(id, chat_id, resource_type, content_type, title, data, created_at)| {
                Ok(Resource {
                    id,
                    chat_id,
                    resource_type,
                    content_type,
                    title,
                    data: serde_json::from_str(&data).map_err(|e| EngineError::ChatStoreError(e.to_string()))?,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
                        .with_timezone(&Utc),
                })
            })
            .transpose()
        })
        .await
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
    }

    /// A [`ResourceSink`] bound to one chat, suitable for building an
    /// [`crate::context::InvocationContext`] for that chat's tool calls.
    pub fn scoped(self: &Arc<Self>, chat_id: impl Into<String>) -> Arc<dyn ResourceSink> {
        Arc::new(ScopedResourceSink { store: self.clone(), chat_id: chat_id.into() })
    }

    async fn insert(&self, chat_id: &str, resource_type: &str, content_type: &str, title: &str, data: serde_json::Value) -> Result<String, EngineError> {
        let id = uuid::Uuid::new_v4().to_string();
        let chat_id = chat_id.to_string();
        let resource_type = resource_type.to_string();
        let content_type = content_type.to_string();
        let title = title.to_string();
        let data = serde_json::to_string(&data).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
        let created_at = Utc::now().to_rfc3339();
        let db_path = self.db_path.clone();
        let insert_id = id.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            conn.execute(
                "INSERT INTO resources (id, chat_id, resource_type, content_type, title, data, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![insert_id, chat_id, resource_type, content_type, title, data, created_at],
            )
            .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))??;
        Ok(id)
    }
}

struct ScopedResourceSink {
    store: Arc<SqliteResourceStore>,
    chat_id: String,
}

#[async_trait]
impl ResourceSink for ScopedResourceSink {
    async fn save(
        &self,
        resource_type: &str,
        content_type: &str,
        title: &str,
        data: serde_json::Value,
    ) -> Result<String, EngineError> {
        self.store.insert(&self.chat_id, resource_type, content_type, title, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn serializes_with_content_type() {
        let r = Resource::new("r1", "c1", "chart", "image/png", "Portfolio", serde_json::json!({}), Utc::now());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["content_type"], "image/png");
        assert_eq!(v["resource_type"], "chart");
    }

    #[tokio::test]
    async fn scoped_sink_persists_and_round_trips() {
        let file = NamedTempFile::new().unwrap();
        let store = Arc::new(SqliteResourceStore::new(file.path()).unwrap());
        let sink = store.scoped("c1");
        let id = sink.save("chart", "image/png", "Portfolio", serde_json::json!({"points": [1, 2]})).await.unwrap();
        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.chat_id, "c1");
        assert_eq!(fetched.resource_type, "chart");
        assert_eq!(fetched.data["points"][1], 2);
    }

    #[tokio::test]
    async fn get_missing_resource_returns_none() {
        let file = NamedTempFile::new().unwrap();
        let store = SqliteResourceStore::new(file.path()).unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
