//! Chat Store (spec §4.5, C5): persists the message transcript per chat.
//!
//! Adapted from `loom`'s `SqliteUserMessageStore`: same "open a fresh connection per
//! call inside `spawn_blocking`" pattern (sqlite connections aren't `Send`-friendly to
//! hold across `.await` points), widened from a three-role/plain-text row to the full
//! [`crate::message::Message`] shape, and with a transactional `append_turn` added for
//! the assistant-message-plus-its-tool-messages write spec §4.5 requires to land as one
//! unit (a crash between them must not leave a dangling `tool_call_id`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::params;

use crate::error::EngineError;
use crate::message::{Message, Role, ToolCallRef};

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn append(&self, chat_id: &str, message: &Message) -> Result<(), EngineError>;

    /// Appends an assistant message and the tool-role messages answering its tool
    /// calls as a single transaction.
    async fn append_turn(
        &self,
        chat_id: &str,
        assistant: &Message,
        tool_messages: &[Message],
    ) -> Result<(), EngineError>;

    async fn list(
        &self,
        chat_id: &str,
        before: Option<u64>,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, EngineError>;

    /// Most recent `limit` messages, in chronological order — the slice the agent loop
    /// feeds to the LLM client as conversation history.
    async fn latest(&self, chat_id: &str, limit: u32) -> Result<Vec<Message>, EngineError>;
}

pub struct SqliteChatStore {
    db_path: PathBuf,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn row_to_message(
    role: String,
    content: String,
    tool_calls: Option<String>,
    tool_call_id: Option<String>,
    name: Option<String>,
    resource_id: Option<String>,
    latency_ms: Option<i64>,
    timestamp: String,
) -> Result<Message, EngineError> {
    let role = match role.as_str() {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        "tool" => Role::Tool,
        other => return Err(EngineError::ChatStoreError(format!("unknown role in row: {other}"))),
    };
    let tool_calls = tool_calls
        .map(|raw| serde_json::from_str::<Vec<ToolCallRef>>(&raw))
        .transpose()
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
    let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
        .with_timezone(&chrono::Utc);
    Ok(Message {
        role,
        content,
        tool_calls,
        tool_call_id,
        name,
        resource_id,
        latency_ms: latency_ms.map(|v| v as u64),
        timestamp,
    })
}

fn insert_sql() -> &'static str {
    "INSERT INTO messages \
     (chat_id, role, content, tool_calls, tool_call_id, name, resource_id, latency_ms, timestamp) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
}

fn bind_message(chat_id: &str, message: &Message) -> Result<InsertParams, EngineError> {
    let tool_calls = message
        .tool_calls
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
    Ok(InsertParams {
        chat_id: chat_id.to_string(),
        role: role_str(message.role).to_string(),
        content: message.content.clone(),
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
        name: message.name.clone(),
        resource_id: message.resource_id.clone(),
        latency_ms: message.latency_ms.map(|v| v as i64),
        timestamp: message.timestamp.to_rfc3339(),
    })
}

struct InsertParams {
    chat_id: String,
    role: String,
    content: String,
    tool_calls: Option<String>,
    tool_call_id: Option<String>,
    name: Option<String>,
    resource_id: Option<String>,
    latency_ms: Option<i64>,
    timestamp: String,
}

impl SqliteChatStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tool_calls TEXT,
                tool_call_id TEXT,
                name TEXT,
                resource_id TEXT,
                latency_ms INTEGER,
                timestamp TEXT NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_messages_chat_id ON messages(chat_id)", [])
            .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
        Ok(Self { db_path })
    }

    fn fetch_rows(
        conn: &rusqlite::Connection,
        chat_id: &str,
        before: Option<i64>,
        limit: i64,
        descending: bool,
    ) -> Result<Vec<Message>, EngineError> {
        let order = if descending { "DESC" } else { "ASC" };
        let sql = match before {
            Some(_) => format!(
                "SELECT role, content, tool_calls, tool_call_id, name, resource_id, latency_ms, timestamp \
                 FROM messages WHERE chat_id = ?1 AND id < ?2 ORDER BY id {order} LIMIT ?3"
            ),
            None => format!(
                "SELECT role, content, tool_calls, tool_call_id, name, resource_id, latency_ms, timestamp \
                 FROM messages WHERE chat_id = ?1 ORDER BY id {order} LIMIT ?2"
            ),
        };
        let mut stmt = conn.prepare(&sql).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<Message> {
            let message = row_to_message(
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            );
            message.map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(std::io::Error::other(e.to_string())))
            })
        };
        let rows = match before {
            Some(b) => stmt.query_map(params![chat_id, b, limit], map_row),
            None => stmt.query_map(params![chat_id, limit], map_row),
        }
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| EngineError::ChatStoreError(e.to_string()))
    }
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn append(&self, chat_id: &str, message: &Message) -> Result<(), EngineError> {
        let bound = bind_message(chat_id, message)?;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            conn.execute(
                insert_sql(),
                params![
                    bound.chat_id,
                    bound.role,
                    bound.content,
                    bound.tool_calls,
                    bound.tool_call_id,
                    bound.name,
                    bound.resource_id,
                    bound.latency_ms,
                    bound.timestamp,
                ],
            )
            .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
    }

    async fn append_turn(
        &self,
        chat_id: &str,
        assistant: &Message,
        tool_messages: &[Message],
    ) -> Result<(), EngineError> {
        let mut bound = vec![bind_message(chat_id, assistant)?];
        for m in tool_messages {
            bound.push(bind_message(chat_id, m)?);
        }
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            let tx = conn.transaction().map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            for b in &bound {
                tx.execute(
                    insert_sql(),
                    params![
                        b.chat_id, b.role, b.content, b.tool_calls, b.tool_call_id, b.name,
                        b.resource_id, b.latency_ms, b.timestamp,
                    ],
                )
                .map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            }
            tx.commit().map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
    }

    async fn list(
        &self,
        chat_id: &str,
        before: Option<u64>,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, EngineError> {
        let chat_id = chat_id.to_string();
        let limit = limit.unwrap_or(100).min(1000) as i64;
        let before = before.map(|b| b as i64);
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            Self::fetch_rows(&conn, &chat_id, before, limit, false)
        })
        .await
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))?
    }

    async fn latest(&self, chat_id: &str, limit: u32) -> Result<Vec<Message>, EngineError> {
        let chat_id = chat_id.to_string();
        let db_path = self.db_path.clone();
        let mut rows = tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path).map_err(|e| EngineError::ChatStoreError(e.to_string()))?;
            Self::fetch_rows(&conn, &chat_id, None, limit as i64, true)
        })
        .await
        .map_err(|e| EngineError::ChatStoreError(e.to_string()))??;
        rows.reverse();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ToolCallFunction, ToolCallKind};
    use tempfile::NamedTempFile;

    fn call(id: &str) -> ToolCallRef {
        ToolCallRef {
            id: id.into(),
            kind: ToolCallKind::Function,
            function: ToolCallFunction { name: "get_portfolio".into(), arguments: "{}".into() },
        }
    }

    #[tokio::test]
    async fn append_and_list_preserve_order() {
        let file = NamedTempFile::new().unwrap();
        let store = SqliteChatStore::new(file.path()).unwrap();
        store.append("c1", &Message::user("hi", chrono::Utc::now())).await.unwrap();
        store.append("c1", &Message::assistant("hello", vec![], None, chrono::Utc::now())).await.unwrap();
        let msgs = store.list("c1", None, Some(10)).await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn append_turn_lands_assistant_and_tool_messages_together() {
        let file = NamedTempFile::new().unwrap();
        let store = SqliteChatStore::new(file.path()).unwrap();
        let assistant = Message::assistant("", vec![call("tc1")], Some(120), chrono::Utc::now());
        let tool_msg = Message::tool("tc1", "get_portfolio", "{\"value\":100}", None, chrono::Utc::now());
        store.append_turn("c1", &assistant, &[tool_msg]).await.unwrap();
        let msgs = store.list("c1", None, Some(10)).await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::Assistant);
        assert_eq!(msgs[1].role, Role::Tool);
        assert_eq!(msgs[1].tool_call_id.as_deref(), Some("tc1"));
    }

    #[tokio::test]
    async fn latest_returns_chronological_order_within_window() {
        let file = NamedTempFile::new().unwrap();
        let store = SqliteChatStore::new(file.path()).unwrap();
        for i in 0..5 {
            store.append("c2", &Message::user(format!("m{i}"), chrono::Utc::now())).await.unwrap();
        }
        let last3 = store.latest("c2", 3).await.unwrap();
        assert_eq!(last3.len(), 3);
        assert_eq!(last3[0].content, "m2");
        assert_eq!(last3[2].content, "m4");
    }

    #[tokio::test]
    async fn list_before_paginates() {
        let file = NamedTempFile::new().unwrap();
        let store = SqliteChatStore::new(file.path()).unwrap();
        for i in 0..5 {
            store.append("c3", &Message::user(format!("m{i}"), chrono::Utc::now())).await.unwrap();
        }
        let page1 = store.list("c3", None, Some(2)).await.unwrap();
        assert_eq!(page1.len(), 2);
        let page2 = store.list("c3", Some(3), Some(2)).await.unwrap();
        assert_eq!(page2.len(), 2);
    }
}
