use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::sessions::ChatMessage;

/// Where a turn came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Channel {
    #[default]
    Cli,
    Email,
    Slack,
    Discord,
}

/// Optional per-turn context supplied by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_history: Option<Vec<ChatMessage>>,
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub channel: Channel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            channel: Channel::default(),
            message: message.into(),
            context: None,
            user_id: None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.context
            .as_ref()
            .and_then(|c| c.session_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn approval_mode(&self) -> bool {
        self.context
            .as_ref()
            .and_then(|c| c.approval_mode)
            .unwrap_or(false)
    }

    /// Client-supplied history, only when it is non-empty.
    pub fn client_history(&self) -> Option<&[ChatMessage]> {
        self.context
            .as_ref()
            .and_then(|c| c.conversation_history.as_deref())
            .filter(|h| !h.is_empty())
    }
}

/// Buffered (non-streaming) reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub content: String,
    pub session_id: String,
    pub needs_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
