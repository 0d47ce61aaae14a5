// ── AgentPRD Core Library ───────────────────────────────────────────────────
//
// Shared logic for the AgentPRD gateway and its clients: the streaming
// multiplex protocol, session history, key-value storage, product-management
// tools, model providers, the agent loop, the HTTP gateway and the HTTP
// client used by the REPL and the TUI.

pub mod agent;
pub mod args;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod kv;
pub mod logging;
pub mod protocol;
pub mod providers;
pub mod reasoning;
pub mod retry;
pub mod sessions;
pub mod theme;
pub mod tools;

// Re-export the types most callers need at crate root
pub use error::{ClientError, ProviderError, StoreError, ToolError};
pub use protocol::{DecodedStream, StreamDecoder, StreamEncoder, StreamMetadata, ToolEvent};
pub use sessions::{ChatMessage, MessageRole};
