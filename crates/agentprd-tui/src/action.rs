use agentprd_core::client::Conversation;
use agentprd_core::protocol::{DecodedStream, ToolEvent};
use strum::Display;

/// Result of a finished turn, handed back from the request task.
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// The conversation after it absorbed the turn
    pub conversation: Conversation,
    pub decoded: DecodedStream,
}

/// Actions that drive the application.
#[derive(Debug, Clone, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Tick,
    Render,
    Resize(u16, u16),
    Quit,
    ScrollUp,
    ScrollDown,
    ScrollBottom,
    /// The user submitted text from the input bar (prompt or /command)
    InputSubmit(String),
    /// A text delta from the turn in flight
    StreamText(String),
    /// A tool lifecycle event from the turn in flight
    StreamToolEvent(ToolEvent),
    /// The turn completed and the conversation absorbed it
    TurnFinished(Box<TurnResult>),
    /// The turn failed; carries the user-facing message
    TurnFailed(String),
    StatusLine(String),
}
