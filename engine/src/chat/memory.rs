//! In-process [`ChatStore`] (spec §4.8): the scratch transcript a
//! [`crate::agent::SubAgentTool`] drives its inner [`crate::agent::AgentLoop`]
//! against. A sub-agent's transcript is born and discarded with the call — it has
//! no reason to survive a process restart, so it skips SQLite entirely rather than
//! standing up a throwaway table per invocation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::message::Message;

use super::store::ChatStore;

#[derive(Default)]
pub struct InMemoryChatStore {
    chats: Mutex<HashMap<String, Vec<Message>>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn append(&self, chat_id: &str, message: &Message) -> Result<(), EngineError> {
        self.chats.lock().unwrap().entry(chat_id.to_string()).or_default().push(message.clone());
        Ok(())
    }

    async fn append_turn(
        &self,
        chat_id: &str,
        assistant: &Message,
        tool_messages: &[Message],
    ) -> Result<(), EngineError> {
        let mut chats = self.chats.lock().unwrap();
        let entry = chats.entry(chat_id.to_string()).or_default();
        entry.push(assistant.clone());
        entry.extend(tool_messages.iter().cloned());
        Ok(())
    }

    /// Mirrors [`super::store::SqliteChatStore::list`]: oldest-first, id being the
    /// 1-based insertion position since this store has no real row id.
    async fn list(
        &self,
        chat_id: &str,
        before: Option<u64>,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, EngineError> {
        let chats = self.chats.lock().unwrap();
        let messages = chats.get(chat_id).cloned().unwrap_or_default();
        let limit = limit.unwrap_or(100).min(1000) as usize;
        let before = before.map(|b| b as usize);
        let filtered: Vec<Message> = messages
            .into_iter()
            .enumerate()
            .filter(|(i, _)| before.map(|b| i + 1 < b).unwrap_or(true))
            .map(|(_, m)| m)
            .take(limit)
            .collect();
        Ok(filtered)
    }

    async fn latest(&self, chat_id: &str, limit: u32) -> Result<Vec<Message>, EngineError> {
        self.list(chat_id, None, Some(limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn append_then_latest_preserves_order() {
        let store = InMemoryChatStore::new();
        store.append("c1", &Message::user("hi", Utc::now())).await.unwrap();
        store.append("c1", &Message::assistant("hello", vec![], None, Utc::now())).await.unwrap();
        let latest = store.latest("c1", 10).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].content, "hi");
        assert_eq!(latest[1].content, "hello");
    }

    #[tokio::test]
    async fn append_turn_lands_assistant_and_tool_messages_together() {
        let store = InMemoryChatStore::new();
        let assistant = Message::assistant("", vec![], None, Utc::now());
        let tool = Message::tool("tc1", "echo", "{}", None, Utc::now());
        store.append_turn("c1", &assistant, std::slice::from_ref(&tool)).await.unwrap();
        let all = store.list("c1", None, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn unknown_chat_returns_empty() {
        let store = InMemoryChatStore::new();
        assert!(store.latest("missing", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn latest_respects_limit() {
        let store = InMemoryChatStore::new();
        for i in 0..5 {
            store.append("c1", &Message::user(format!("msg{i}"), Utc::now())).await.unwrap();
        }
        let latest = store.latest("c1", 2).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].content, "msg3");
        assert_eq!(latest[1].content, "msg4");
    }
}
