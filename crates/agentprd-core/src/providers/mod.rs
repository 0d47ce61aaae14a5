//! Model providers.
//!
//! A provider streams one model step into an mpsc channel as
//! [`StreamChunk`]s; the agent turns those into generation events.

mod openai;
mod scripted;

pub use openai::{OpenAiProvider, SseBuffer};
pub use scripted::ScriptedProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ProviderError;

/// A streaming chunk from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamChunk {
    /// Text content delta
    Text(String),
    /// Tool call started
    ToolCallStart {
        index: usize,
        id: String,
        name: String,
    },
    /// Tool call arguments delta
    ToolCallDelta { index: usize, arguments: String },
    /// Step finished
    Done,
}

/// A tool call requested by the model, arguments still as raw JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Conversation entries as the model sees them.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelMessage {
    System(String),
    User(String),
    Assistant {
        content: String,
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// Function-style tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

/// Request parameters for one streaming step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelRequest {
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Stream one model step into `tx`. Implementations send
    /// [`StreamChunk::Done`] when the step ends normally.
    async fn stream(
        &self,
        request: &ModelRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<(), ProviderError>;
}
