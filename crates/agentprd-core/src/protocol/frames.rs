use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sessions::ChatMessage;

/// Marks the start of a tool-event frame. The JSON payload runs to the next
/// newline.
pub const TOOL_EVENT_SENTINEL: &str = "\n__AGENTPRD_TOOL_EVENT__";

/// Marks the start of the metadata frame. Everything after it, up to the end
/// of the body, is the metadata JSON.
pub const METADATA_SENTINEL: &str = "\n__AGENTPRD_METADATA__\n";

/// Lifecycle stage reported by a tool event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolEventKind {
    #[serde(rename = "tool-call-start", alias = "call-start")]
    CallStart,
    #[serde(rename = "tool-call", alias = "call")]
    Call,
    #[serde(rename = "tool-result", alias = "result")]
    Result,
    #[serde(rename = "step-finish")]
    StepFinish,
}

/// One tool lifecycle event, correlated by `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEvent {
    #[serde(rename = "type")]
    pub kind: ToolEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continued: Option<bool>,
}

impl ToolEvent {
    fn bare(kind: ToolEventKind) -> Self {
        Self {
            kind,
            tool_name: None,
            args: None,
            result: None,
            tool_call_id: None,
            continued: None,
        }
    }

    /// The model began a call to `name`; arguments are still streaming.
    pub fn call_start(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(id.into()),
            tool_name: Some(name.into()),
            ..Self::bare(ToolEventKind::CallStart)
        }
    }

    /// The call's arguments are complete.
    pub fn call(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            tool_call_id: Some(id.into()),
            tool_name: Some(name.into()),
            args: Some(args),
            ..Self::bare(ToolEventKind::Call)
        }
    }

    /// The tool ran and produced `result`.
    pub fn result(id: impl Into<String>, name: impl Into<String>, result: Value) -> Self {
        Self {
            tool_call_id: Some(id.into()),
            tool_name: Some(name.into()),
            result: Some(result),
            ..Self::bare(ToolEventKind::Result)
        }
    }

    /// A model step ended; `continued` is true when another step follows.
    pub fn step_finish(continued: bool) -> Self {
        Self {
            continued: Some(continued),
            ..Self::bare(ToolEventKind::StepFinish)
        }
    }
}

/// Trailing record of every stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMetadata {
    pub session_id: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
    #[serde(default)]
    pub needs_approval: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_event_uses_wire_field_names() {
        let event = ToolEvent::call("t1", "store_prd", json!({"title": "Onboarding"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "tool-call",
                "toolName": "store_prd",
                "args": {"title": "Onboarding"},
                "toolCallId": "t1"
            })
        );
    }

    #[test]
    fn short_kind_names_are_accepted() {
        let event: ToolEvent =
            serde_json::from_str(r#"{"type":"result","toolCallId":"x","result":1}"#).unwrap();
        assert_eq!(event.kind, ToolEventKind::Result);
        let event: ToolEvent = serde_json::from_str(r#"{"type":"call-start"}"#).unwrap();
        assert_eq!(event.kind, ToolEventKind::CallStart);
    }

    #[test]
    fn metadata_defaults_missing_fields() {
        let meta: StreamMetadata = serde_json::from_str(r#"{"sessionId":"s9"}"#).unwrap();
        assert_eq!(meta.session_id, "s9");
        assert!(meta.conversation_history.is_empty());
        assert!(!meta.needs_approval);
    }

    #[test]
    fn sentinels_share_a_prefix_but_differ() {
        assert!(TOOL_EVENT_SENTINEL.starts_with("\n__AGENTPRD_"));
        assert!(METADATA_SENTINEL.starts_with("\n__AGENTPRD_"));
        assert!(!TOOL_EVENT_SENTINEL.contains(METADATA_SENTINEL));
        assert!(!METADATA_SENTINEL.contains(TOOL_EVENT_SENTINEL));
    }
}
