use serde_json::Value;

use super::frames::{METADATA_SENTINEL, StreamMetadata, TOOL_EVENT_SENTINEL, ToolEvent};

/// Text written into the stream when the model fails mid-turn.
pub const GENERATION_ERROR_NOTICE: &str =
    "\n\nSorry, something went wrong while generating this response.";

/// Events produced while the agent generates a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// A text token or fragment.
    Text(String),
    /// The model started emitting a tool call.
    ToolCallStart { id: String, name: String },
    /// The tool call is complete and about to run.
    ToolCall { id: String, name: String, args: Value },
    /// The tool finished.
    ToolResult {
        id: String,
        name: String,
        result: Value,
    },
    /// One model step ended; `continued` is true when another step follows.
    StepFinish { continued: bool },
    /// The model call failed; the turn ends after this.
    Error(String),
}

impl GenerationEvent {
    /// The tool-event frame for this event, `None` for text and errors.
    pub fn to_tool_event(&self) -> Option<ToolEvent> {
        match self {
            Self::Text(_) | Self::Error(_) => None,
            Self::ToolCallStart { id, name } => Some(ToolEvent::call_start(id, name)),
            Self::ToolCall { id, name, args } => Some(ToolEvent::call(id, name, args.clone())),
            Self::ToolResult { id, name, result } => {
                Some(ToolEvent::result(id, name, result.clone()))
            }
            Self::StepFinish { continued } => Some(ToolEvent::step_finish(*continued)),
        }
    }
}

/// Serialize a tool event as a complete frame.
pub fn encode_tool_event(event: &ToolEvent) -> String {
    match serde_json::to_string(event) {
        Ok(json) => format!("{TOOL_EVENT_SENTINEL}{json}\n"),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping unserializable tool event");
            String::new()
        }
    }
}

/// Serialize the trailing metadata frame.
pub fn encode_metadata(metadata: &StreamMetadata) -> String {
    match serde_json::to_string(metadata) {
        Ok(json) => format!("{METADATA_SENTINEL}{json}"),
        Err(e) => {
            tracing::warn!(error = %e, "Metadata could not be serialized");
            METADATA_SENTINEL.to_string()
        }
    }
}

/// Turns generation events into response body text and remembers the plain
/// text that went out, which becomes the assistant message of the turn.
#[derive(Debug, Default)]
pub struct StreamEncoder {
    content: String,
    finished: bool,
}

impl StreamEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body text for one event. Text passes through unchanged; everything
    /// else becomes a tool-event frame. Nothing is emitted after `finish`.
    pub fn encode(&mut self, event: &GenerationEvent) -> String {
        if self.finished {
            return String::new();
        }
        match event {
            GenerationEvent::Text(text) => {
                self.content.push_str(text);
                text.clone()
            }
            GenerationEvent::Error(message) => {
                tracing::warn!(error = %message, "Generation failed mid-stream");
                self.content.push_str(GENERATION_ERROR_NOTICE);
                GENERATION_ERROR_NOTICE.to_string()
            }
            other => other
                .to_tool_event()
                .map(|event| encode_tool_event(&event))
                .unwrap_or_default(),
        }
    }

    /// Plain text emitted so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Terminate the stream with the metadata frame.
    pub fn finish(&mut self, metadata: &StreamMetadata) -> String {
        if self.finished {
            return String::new();
        }
        self.finished = true;
        encode_metadata(metadata)
    }
}
