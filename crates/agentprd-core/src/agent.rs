//! The agent loop: one user turn in, a stream of generation events out.
//!
//! A turn runs up to `max_steps` model calls. Each step streams text
//! straight through, collects tool calls, executes them and feeds the
//! results back to the model for the next step.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::ProviderError;
use crate::kv::KvStore;
use crate::protocol::{
    ChatReply, ChatRequest, GENERATION_ERROR_NOTICE, GenerationEvent, StreamEncoder,
    StreamMetadata,
};
use crate::providers::{ModelMessage, ModelProvider, ModelRequest, StreamChunk, ToolCallRequest};
use crate::sessions::{ChatMessage, MessageRole, Session, SessionStore, new_session_id, trim_history};
use crate::tools::{ToolContext, ToolRegistry};

/// What a finished turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub session_id: String,
    /// Plain text the user saw, including any error notice.
    pub content: String,
    /// Prior history plus this turn, capped to the history window.
    pub history: Vec<ChatMessage>,
    pub needs_approval: bool,
    pub error: Option<String>,
    pub steps: usize,
}

/// Output of one model step.
#[derive(Debug, Default)]
struct StepOutput {
    text: String,
    calls: Vec<ToolCallRequest>,
}

pub struct Agent {
    provider: Arc<dyn ModelProvider>,
    tools: ToolRegistry,
    sessions: SessionStore,
    system_prompt: String,
    max_steps: usize,
}

impl Agent {
    pub fn new(provider: Arc<dyn ModelProvider>, kv: Arc<dyn KvStore>, config: &GatewayConfig) -> Self {
        Self {
            provider,
            tools: ToolRegistry::new(kv.clone()),
            sessions: SessionStore::new(kv).with_window(config.history_window),
            system_prompt: config.system_prompt.clone(),
            max_steps: config.max_steps.max(1),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Client-supplied history wins when non-empty; otherwise fall back to
    /// the persisted copy.
    async fn resolve_history(&self, request: &ChatRequest, session_id: &str) -> Vec<ChatMessage> {
        if let Some(history) = request.client_history() {
            return history.to_vec();
        }
        match self.sessions.load(session_id).await {
            Ok(Some(session)) => session.messages,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(session = session_id, error = %e, "Failed to load session history");
                Vec::new()
            }
        }
    }

    fn build_messages(&self, history: &[ChatMessage], message: &str) -> Vec<ModelMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ModelMessage::System(self.system_prompt.clone()));
        for m in history {
            messages.push(match m.role {
                MessageRole::User => ModelMessage::User(m.content.clone()),
                MessageRole::Assistant => ModelMessage::Assistant {
                    content: m.content.clone(),
                    tool_calls: Vec::new(),
                },
            });
        }
        messages.push(ModelMessage::User(message.to_string()));
        messages
    }

    /// Run one model step, forwarding text and tool-call starts as they
    /// arrive.
    async fn run_step(
        &self,
        step: usize,
        request: &ModelRequest,
        tx: &mpsc::Sender<GenerationEvent>,
    ) -> (StepOutput, Result<(), ProviderError>) {
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<StreamChunk>(64);

        let consume = async {
            let mut out = StepOutput::default();
            let mut pending: BTreeMap<usize, ToolCallRequest> = BTreeMap::new();
            while let Some(chunk) = chunk_rx.recv().await {
                match chunk {
                    StreamChunk::Text(text) => {
                        out.text.push_str(&text);
                        let _ = tx.send(GenerationEvent::Text(text)).await;
                    }
                    StreamChunk::ToolCallStart { index, id, name } => {
                        let id = if id.is_empty() {
                            format!("call_{step}_{index}")
                        } else {
                            id
                        };
                        let _ = tx
                            .send(GenerationEvent::ToolCallStart {
                                id: id.clone(),
                                name: name.clone(),
                            })
                            .await;
                        pending.insert(
                            index,
                            ToolCallRequest {
                                id,
                                name,
                                arguments: String::new(),
                            },
                        );
                    }
                    StreamChunk::ToolCallDelta { index, arguments } => match pending.get_mut(&index) {
                        Some(call) => call.arguments.push_str(&arguments),
                        None => debug!(index, "Arguments for a tool call that never started"),
                    },
                    StreamChunk::Done => {}
                }
            }
            out.calls = pending.into_values().collect();
            out
        };

        let (result, out) = tokio::join!(self.provider.stream(request, chunk_tx), consume);
        (out, result)
    }

    /// Generate one turn, sending events to `tx` as they happen. Nothing is
    /// persisted here.
    pub async fn run_turn(&self, request: &ChatRequest, tx: mpsc::Sender<GenerationEvent>) -> TurnOutcome {
        let session_id = request
            .session_id()
            .map(str::to_string)
            .unwrap_or_else(new_session_id);
        let mut history = self.resolve_history(request, &session_id).await;
        trim_history(&mut history, self.sessions.window());

        info!(
            session = %session_id,
            channel = %request.channel,
            history_len = history.len(),
            approval_mode = request.approval_mode(),
            "Starting turn"
        );

        let tool_ctx = ToolContext {
            session_id: session_id.clone(),
            user_id: request.user_id.clone(),
            approval_mode: request.approval_mode(),
        };
        let mut model_request = ModelRequest {
            messages: self.build_messages(&history, &request.message),
            tools: self.tools.definitions(),
        };

        let mut content = String::new();
        let mut needs_approval = false;
        let mut error = None;
        let mut steps = 0;

        for step in 0..self.max_steps {
            steps = step + 1;
            let (output, result) = self.run_step(step, &model_request, &tx).await;
            content.push_str(&output.text);

            if let Err(e) = result {
                warn!(session = %session_id, step, provider = self.provider.name(), error = %e, "Model step failed");
                let _ = tx.send(GenerationEvent::Error(e.to_string())).await;
                content.push_str(GENERATION_ERROR_NOTICE);
                error = Some(e.to_string());
                break;
            }

            let continued = !output.calls.is_empty() && step + 1 < self.max_steps;
            if !output.calls.is_empty() {
                model_request.messages.push(ModelMessage::Assistant {
                    content: output.text.clone(),
                    tool_calls: output.calls.clone(),
                });
            }

            for call in &output.calls {
                let args = parse_arguments(&call.arguments);
                let _ = tx
                    .send(GenerationEvent::ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        args: args.clone(),
                    })
                    .await;

                let outcome = self.tools.execute(&call.name, &args, &tool_ctx).await;
                needs_approval |= outcome.pending_approval;
                debug!(tool = %call.name, id = %call.id, "Tool finished");

                let _ = tx
                    .send(GenerationEvent::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        result: outcome.result.clone(),
                    })
                    .await;
                model_request.messages.push(ModelMessage::Tool {
                    tool_call_id: call.id.clone(),
                    content: outcome.result.to_string(),
                });
            }

            let _ = tx.send(GenerationEvent::StepFinish { continued }).await;
            if !continued {
                if !output.calls.is_empty() {
                    debug!(session = %session_id, max_steps = self.max_steps, "Step limit reached");
                }
                break;
            }
        }

        history.push(ChatMessage::user(&request.message));
        history.push(ChatMessage::assistant(&content));
        trim_history(&mut history, self.sessions.window());

        info!(
            session = %session_id,
            steps,
            content_len = content.len(),
            needs_approval,
            "Turn finished"
        );

        TurnOutcome {
            session_id,
            content,
            history,
            needs_approval,
            error,
            steps,
        }
    }

    /// Persist the turn. Failures are logged; the turn still completes.
    async fn persist(&self, outcome: &TurnOutcome) {
        let mut session = Session::new(&outcome.session_id);
        session.messages = outcome.history.clone();
        if let Err(e) = self.sessions.save(&session).await {
            warn!(session = %outcome.session_id, error = %e, "Failed to persist session");
        }
    }

    /// Run a turn and write the multiplexed response body to `out`: text and
    /// tool-event frames as they happen, then the metadata frame once the
    /// session has been persisted.
    pub async fn handle_stream(&self, request: ChatRequest, out: mpsc::Sender<Result<Bytes, Infallible>>) {
        let (tx, mut rx) = mpsc::channel::<GenerationEvent>(64);
        let mut encoder = StreamEncoder::new();
        let mut client_gone = false;

        let forward = async {
            while let Some(event) = rx.recv().await {
                let chunk = encoder.encode(&event);
                if chunk.is_empty() || client_gone {
                    continue;
                }
                if out.send(Ok(Bytes::from(chunk))).await.is_err() {
                    debug!("Client disconnected mid-stream");
                    client_gone = true;
                }
            }
        };

        let (outcome, ()) = tokio::join!(self.run_turn(&request, tx), forward);

        self.persist(&outcome).await;

        let metadata = StreamMetadata {
            session_id: outcome.session_id.clone(),
            conversation_history: outcome.history,
            needs_approval: outcome.needs_approval,
        };
        let _ = out.send(Ok(Bytes::from(encoder.finish(&metadata)))).await;
    }

    /// Run a turn to completion and return a single JSON-ready reply.
    pub async fn handle_buffered(&self, request: ChatRequest) -> ChatReply {
        let (tx, mut rx) = mpsc::channel::<GenerationEvent>(64);
        let drain = async { while rx.recv().await.is_some() {} };
        let (outcome, ()) = tokio::join!(self.run_turn(&request, tx), drain);

        self.persist(&outcome).await;

        ChatReply {
            content: outcome.content,
            session_id: outcome.session_id,
            needs_approval: outcome.needs_approval,
            error: outcome.error,
        }
    }
}

/// Parse tool-call arguments; an empty string means no arguments.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|e| {
        debug!(error = %e, "Tool arguments are not valid JSON");
        json!({ "_raw": raw })
    })
}
