//! Display state shared by every component.
//!
//! All turn bookkeeping lives here so it can be tested without a terminal.

use std::time::Instant;

use agentprd_core::protocol::{DecodedStream, ToolCallTracker, ToolEvent, ToolEventKind};
use agentprd_core::reasoning::ReasoningDetector;
use serde_json::Value;

use crate::palette;

/// Shown when a turn fails outright.
pub const APOLOGY: &str = "Sorry, something went wrong while talking to the agent.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRole {
    User,
    Assistant,
    Tool,
    Info,
    Warning,
    Error,
}

impl DisplayRole {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Agent",
            Self::Tool => "Tool",
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub role: DisplayRole,
    pub content: String,
    /// Assistant reply still receiving text
    pub streaming: bool,
    /// Reply classified as thinking out loud
    pub reasoning: bool,
    /// Correlates tool lines with their events
    pub tool_call_id: Option<String>,
}

impl DisplayMessage {
    pub fn new(role: DisplayRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            streaming: false,
            reasoning: false,
            tool_call_id: None,
        }
    }
}

#[derive(Debug)]
pub struct AppState {
    pub messages: Vec<DisplayMessage>,
    pub session_id: String,
    pub approval_mode: bool,
    /// Lines scrolled up from the bottom of the message list
    pub scroll: u16,
    pub status: Option<String>,
    pub should_quit: bool,
    /// Set while a turn is in flight
    streaming_since: Option<Instant>,
    /// Index of the in-flight assistant placeholder
    placeholder: Option<usize>,
    tracker: ToolCallTracker,
    reasoning: ReasoningDetector,
}

impl AppState {
    pub fn new(session_id: impl Into<String>, approval_mode: bool, show_reasoning: bool) -> Self {
        Self {
            messages: vec![DisplayMessage::new(
                DisplayRole::Info,
                "Welcome to AgentPRD. Type /help for commands.",
            )],
            session_id: session_id.into(),
            approval_mode,
            scroll: 0,
            status: None,
            should_quit: false,
            streaming_since: None,
            placeholder: None,
            tracker: ToolCallTracker::new(),
            reasoning: ReasoningDetector::new(show_reasoning),
        }
    }

    pub fn push(&mut self, role: DisplayRole, content: impl Into<String>) {
        self.messages.push(DisplayMessage::new(role, content));
        self.scroll = 0;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.placeholder = None;
        self.scroll = 0;
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming_since.is_some()
    }

    pub fn streaming_since(&self) -> Option<Instant> {
        self.streaming_since
    }

    pub fn active_tools(&self) -> usize {
        self.tracker.active_count()
    }

    pub fn set_show_reasoning(&mut self, enabled: bool) {
        self.reasoning = ReasoningDetector::new(enabled);
    }

    pub fn show_reasoning(&self) -> bool {
        self.reasoning.is_enabled()
    }

    /// Show the user's message and an empty streaming reply under it.
    pub fn begin_turn(&mut self, message: &str) {
        self.push(DisplayRole::User, message);
        let mut reply = DisplayMessage::new(DisplayRole::Assistant, "");
        reply.streaming = true;
        self.messages.push(reply);
        self.placeholder = Some(self.messages.len() - 1);
        self.streaming_since = Some(Instant::now());
        self.tracker.clear();
        self.reasoning.reset();
    }

    pub fn append_text(&mut self, text: &str) {
        let reasoning = self.reasoning.observe(text);
        if let Some(reply) = self.placeholder.and_then(|i| self.messages.get_mut(i)) {
            reply.content.push_str(text);
            reply.reasoning = reasoning;
        }
    }

    /// Tool lines sit between the user's message and the reply, one line per
    /// call, updated in place as the call progresses.
    pub fn apply_tool_event(&mut self, event: &ToolEvent) {
        self.tracker.observe(event);
        let Some(id) = event.tool_call_id.as_deref() else {
            return;
        };
        let name = event.tool_name.as_deref().unwrap_or("tool");

        let line = match event.kind {
            ToolEventKind::CallStart => format!("{} {name}", palette::ICON_PENDING),
            ToolEventKind::Call => {
                let args = event.args.as_ref().map(summarize).unwrap_or_default();
                format!("{} {name} {args}", palette::ICON_PENDING)
            }
            ToolEventKind::Result => result_line(name, event.result.as_ref()),
            ToolEventKind::StepFinish => return,
        };

        if let Some(existing) = self
            .messages
            .iter_mut()
            .find(|m| m.tool_call_id.as_deref() == Some(id))
        {
            existing.content = line.trim_end().to_string();
            return;
        }

        let mut message = DisplayMessage::new(DisplayRole::Tool, line.trim_end());
        message.tool_call_id = Some(id.to_string());
        match self.placeholder {
            Some(index) => {
                self.messages.insert(index, message);
                self.placeholder = Some(index + 1);
            }
            None => self.messages.push(message),
        }
    }

    /// Settle the reply once the conversation has absorbed the turn.
    pub fn finish_turn(&mut self, decoded: &DecodedStream, session_id: &str) {
        if let Some(index) = self.placeholder.take() {
            if decoded.content.trim().is_empty() {
                self.messages.remove(index);
            } else if let Some(reply) = self.messages.get_mut(index) {
                reply.content = decoded.content.clone();
                reply.streaming = false;
            }
        }
        self.streaming_since = None;
        self.session_id = session_id.to_string();

        if decoded.metadata.is_none() {
            self.push(
                DisplayRole::Warning,
                format!("The reply was cut short. Continuing in a new session ({session_id})."),
            );
        } else if decoded.metadata.as_ref().is_some_and(|m| m.needs_approval) {
            self.push(
                DisplayRole::Warning,
                "Some changes are waiting for your approval. Reply to confirm them.",
            );
        }
        self.scroll = 0;
    }

    /// Settle whatever streamed so far and start over under `new_session_id`.
    /// An empty placeholder is dropped; partial text stays on screen.
    pub fn fail_turn(&mut self, message: &str, new_session_id: &str) {
        if let Some(index) = self.placeholder.take() {
            let keep = match self.messages.get_mut(index) {
                Some(reply) if !reply.content.trim().is_empty() => {
                    reply.streaming = false;
                    true
                }
                Some(_) => false,
                None => true,
            };
            if !keep {
                self.messages.remove(index);
            }
        }
        self.streaming_since = None;
        self.tracker.clear();
        self.session_id = new_session_id.to_string();
        self.push(DisplayRole::Error, format!("{APOLOGY} {message}"));
        self.push(
            DisplayRole::Info,
            format!("Started a new session ({new_session_id})."),
        );
    }
}

fn result_line(name: &str, result: Option<&Value>) -> String {
    let Some(result) = result else {
        return format!("{} {name}", palette::ICON_SUCCESS);
    };
    if let Some(error) = result.get("error").and_then(Value::as_str) {
        return format!("{} {name}: {error}", palette::ICON_ERROR);
    }
    if result.get("status").and_then(Value::as_str) == Some("pending_approval") {
        return format!("{} {name} (awaiting approval)", palette::ICON_HELD);
    }
    format!("{} {name}", palette::ICON_SUCCESS)
}

/// Compact one-line rendering of tool arguments.
fn summarize(args: &Value) -> String {
    const MAX: usize = 60;
    let raw = match args {
        Value::Object(map) if map.is_empty() => return String::new(),
        other => other.to_string(),
    };
    if raw.chars().count() <= MAX {
        raw
    } else {
        let cut: String = raw.chars().take(MAX).collect();
        format!("{cut}…")
    }
}
