use chrono::{Duration, Utc};

use crate::protocol::{DecodedStream, RequestContext};
use crate::sessions::{ChatMessage, HISTORY_WINDOW, MessageRole, new_session_id, trim_history};

/// Pushes of the same role and content closer together than this are
/// treated as duplicates.
pub const DUPLICATE_WINDOW: Duration = Duration::seconds(5);

/// Client-side state of one conversation: the session id and the live
/// history that is sent with every turn.
#[derive(Debug, Clone)]
pub struct Conversation {
    session_id: String,
    history: Vec<ChatMessage>,
    window: usize,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// Start a conversation under a provisional session id.
    pub fn new() -> Self {
        Self::with_session(new_session_id())
    }

    pub fn with_session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            history: Vec::new(),
            window: HISTORY_WINDOW,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Drop the history and start over under a fresh session id.
    pub fn reset(&mut self) {
        self.session_id = new_session_id();
        self.history.clear();
    }

    /// Append unless an identical message was pushed within
    /// [`DUPLICATE_WINDOW`]. Returns whether the message was added.
    pub fn push_unique(&mut self, message: ChatMessage) -> bool {
        let now = Utc::now();
        let duplicate = self.history.iter().any(|m| {
            m.role == message.role
                && m.content == message.content
                && (now - m.timestamp).abs() <= DUPLICATE_WINDOW
        });
        if duplicate {
            tracing::debug!(role = %message.role, "Suppressing duplicate history entry");
            return false;
        }
        self.history.push(message);
        trim_history(&mut self.history, self.window);
        true
    }

    /// Context block for the next request. The history is the state before
    /// the new message.
    pub fn request_context(&self, approval_mode: bool) -> RequestContext {
        RequestContext {
            session_id: Some(self.session_id.clone()),
            command: None,
            approval_mode: Some(approval_mode),
            conversation_history: (!self.history.is_empty()).then(|| self.history.clone()),
        }
    }

    /// Fold a finished turn into the local state.
    ///
    /// The metadata frame is authoritative when present: its session id is
    /// adopted and its history replaces ours when non-empty. Without
    /// metadata the turn stands alone under a new session id.
    pub fn apply_turn(&mut self, user_message: &str, decoded: &DecodedStream) {
        match &decoded.metadata {
            Some(meta) => {
                if !meta.session_id.is_empty() {
                    self.session_id = meta.session_id.clone();
                }
                if meta.conversation_history.is_empty() {
                    self.push_unique(ChatMessage::user(user_message));
                    self.push_unique(ChatMessage::assistant(&decoded.content));
                } else {
                    self.history = meta.conversation_history.clone();
                    trim_history(&mut self.history, self.window);
                }
            }
            None => {
                self.session_id = new_session_id();
                self.history = vec![
                    ChatMessage::user(user_message),
                    ChatMessage::assistant(&decoded.content),
                ];
            }
        }
    }

    /// Number of user turns in the local history.
    pub fn user_turns(&self) -> usize {
        self.history
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StreamMetadata;

    #[test]
    fn duplicate_within_window_is_suppressed() {
        let mut conv = Conversation::new();
        assert!(conv.push_unique(ChatMessage::user("hi")));
        assert!(!conv.push_unique(ChatMessage::user("hi")));
        assert!(conv.push_unique(ChatMessage::assistant("hi")));
        assert_eq!(conv.history().len(), 2);
    }

    #[test]
    fn old_duplicate_is_allowed() {
        let mut conv = Conversation::new();
        let mut old = ChatMessage::user("hi");
        old.timestamp = Utc::now() - Duration::seconds(6);
        conv.push_unique(old);
        assert!(conv.push_unique(ChatMessage::user("hi")));
        assert_eq!(conv.history().len(), 2);
    }

    #[test]
    fn metadata_history_replaces_local() {
        let mut conv = Conversation::with_session("s1");
        conv.push_unique(ChatMessage::user("stale"));
        let decoded = DecodedStream {
            content: "answer".into(),
            metadata: Some(StreamMetadata {
                session_id: "s2".into(),
                conversation_history: vec![ChatMessage::user("q"), ChatMessage::assistant("answer")],
                needs_approval: false,
            }),
            ..Default::default()
        };
        conv.apply_turn("q", &decoded);
        assert_eq!(conv.session_id(), "s2");
        assert_eq!(conv.history().len(), 2);
        assert_eq!(conv.history()[0].content, "q");
    }

    #[test]
    fn empty_metadata_history_appends_pair() {
        let mut conv = Conversation::with_session("s1");
        let decoded = DecodedStream {
            content: "answer".into(),
            metadata: Some(StreamMetadata {
                session_id: "s1".into(),
                conversation_history: vec![],
                needs_approval: false,
            }),
            ..Default::default()
        };
        conv.apply_turn("q", &decoded);
        assert_eq!(conv.history().len(), 2);
        assert_eq!(conv.user_turns(), 1);
    }

    #[test]
    fn missing_metadata_starts_new_session() {
        let mut conv = Conversation::with_session("s1");
        conv.push_unique(ChatMessage::user("earlier"));
        let decoded = DecodedStream {
            content: "partial".into(),
            ..Default::default()
        };
        conv.apply_turn("q", &decoded);
        assert_ne!(conv.session_id(), "s1");
        assert_eq!(conv.history().len(), 2);
        assert_eq!(conv.history()[1].content, "partial");
    }

    #[test]
    fn request_context_omits_empty_history() {
        let conv = Conversation::with_session("s1");
        let ctx = conv.request_context(true);
        assert_eq!(ctx.session_id.as_deref(), Some("s1"));
        assert_eq!(ctx.approval_mode, Some(true));
        assert!(ctx.conversation_history.is_none());
    }

    #[test]
    fn history_is_capped() {
        let mut conv = Conversation::new();
        for i in 0..15 {
            conv.push_unique(ChatMessage::user(format!("m{i}")));
        }
        assert_eq!(conv.history().len(), HISTORY_WINDOW);
        assert_eq!(conv.history()[0].content, "m5");
    }
}
