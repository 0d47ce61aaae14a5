//! Conversation sessions.
//!
//! A session ties turns together under an opaque id. The client keeps the
//! live copy of the history and resends it every turn; the copy persisted
//! here is only used to recover a session when the client has none.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::error::StoreError;
use crate::kv::{KvStore, namespaces};

/// Number of messages kept in persisted sessions and metadata frames.
pub const HISTORY_WINDOW: usize = 10;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One entry of a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Keep only the most recent `window` messages, oldest dropped first.
pub fn trim_history(messages: &mut Vec<ChatMessage>, window: usize) {
    if messages.len() > window {
        let excess = messages.len() - window;
        messages.drain(..excess);
    }
}

/// Generate a fresh session id.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A persisted session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            messages: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Session persistence on top of the key-value store.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
    window: usize,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            window: HISTORY_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Load a session, `None` when nothing was stored under `session_id`.
    pub async fn load(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let entry = self.kv.get(namespaces::SESSIONS, session_id).await?;
        match entry.data {
            Some(data) if entry.exists => Ok(Some(serde_json::from_value(data)?)),
            _ => Ok(None),
        }
    }

    /// Persist a session, overwriting whatever was stored before.
    pub async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let mut record = session.clone();
        trim_history(&mut record.messages, self.window);
        record.updated_at = Utc::now();
        let value = serde_json::to_value(&record)?;
        self.kv
            .set(namespaces::SESSIONS, &record.session_id, value)
            .await
    }

    pub async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.kv.delete(namespaces::SESSIONS, session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;

    #[test]
    fn role_serializes_lowercase() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(MessageRole::Assistant.to_string(), "assistant");
    }

    #[test]
    fn trim_history_keeps_most_recent() {
        let mut messages: Vec<ChatMessage> =
            (0..15).map(|i| ChatMessage::user(format!("m{i}"))).collect();
        trim_history(&mut messages, HISTORY_WINDOW);
        assert_eq!(messages.len(), 10);
        assert_eq!(messages[0].content, "m5");
        assert_eq!(messages[9].content, "m14");
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let store = SessionStore::new(Arc::new(MemoryKvStore::new()));
        let mut session = Session::new("s1");
        session.messages.push(ChatMessage::user("hello"));
        session.messages.push(ChatMessage::assistant("hi there"));
        store.save(&session).await.unwrap();

        let loaded = store.load("s1").await.unwrap().expect("session stored");
        assert_eq!(loaded.session_id, "s1");
        assert_eq!(loaded.messages, session.messages);
    }

    #[tokio::test]
    async fn save_caps_messages_to_window() {
        let store = SessionStore::new(Arc::new(MemoryKvStore::new())).with_window(4);
        let mut session = Session::new("s2");
        for i in 0..9 {
            session.messages.push(ChatMessage::user(format!("m{i}")));
        }
        store.save(&session).await.unwrap();
        let loaded = store.load("s2").await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 4);
        assert_eq!(loaded.messages[0].content, "m5");
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let store = SessionStore::new(Arc::new(MemoryKvStore::new()));
        assert!(store.load("nope").await.unwrap().is_none());
    }
}
