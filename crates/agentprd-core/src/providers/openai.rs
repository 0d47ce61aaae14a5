//! OpenAI-compatible `/chat/completions` streaming.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::{ModelMessage, ModelProvider, ModelRequest, StreamChunk};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::retry::{RetryPolicy, classify_response, retry_with_backoff};

pub struct OpenAiProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(&config.base_url, &config.model, config.api_key())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn request_body(&self, req: &ModelRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(message_to_json).collect();
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

fn message_to_json(message: &ModelMessage) -> Value {
    match message {
        ModelMessage::System(content) => json!({ "role": "system", "content": content }),
        ModelMessage::User(content) => json!({ "role": "user", "content": content }),
        ModelMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut value = json!({ "role": "assistant", "content": content });
            if !tool_calls.is_empty() {
                value["tool_calls"] = tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": { "name": tc.name, "arguments": tc.arguments },
                        })
                    })
                    .collect();
            }
            value
        }
        ModelMessage::Tool {
            tool_call_id,
            content,
        } => json!({ "role": "tool", "tool_call_id": tool_call_id, "content": content }),
    }
}

/// Splits a Server-Sent Events byte stream into `data:` payloads.
///
/// Bytes are held until an event is complete, so a character split across
/// network reads is decoded whole.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes and return the data payloads of every completed event.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        // CR never occurs inside a multi-byte sequence
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
        let mut payloads = Vec::new();
        while let Some(event_end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let event: Vec<u8> = self.buffer.drain(..event_end + 2).collect();
            for line in String::from_utf8_lossy(&event).lines() {
                if let Some(data) = line.strip_prefix("data:") {
                    payloads.push(data.trim_start().to_string());
                }
            }
        }
        payloads
    }
}

/// Chunks carried by one OpenAI stream event, plus whether the step ended.
fn chunks_from_event(json: &Value) -> (Vec<StreamChunk>, bool) {
    let mut chunks = Vec::new();
    let choice = &json["choices"][0];

    if let Some(delta) = choice["delta"].as_object() {
        if let Some(content) = delta.get("content").and_then(|c| c.as_str()) {
            if !content.is_empty() {
                chunks.push(StreamChunk::Text(content.to_string()));
            }
        }

        if let Some(calls) = delta.get("tool_calls").and_then(|t| t.as_array()) {
            for tc in calls {
                let index = tc["index"].as_u64().unwrap_or(0) as usize;
                if let Some(name) = tc["function"]["name"].as_str() {
                    chunks.push(StreamChunk::ToolCallStart {
                        index,
                        id: tc["id"].as_str().unwrap_or_default().to_string(),
                        name: name.to_string(),
                    });
                }
                if let Some(args) = tc["function"]["arguments"].as_str() {
                    if !args.is_empty() {
                        chunks.push(StreamChunk::ToolCallDelta {
                            index,
                            arguments: args.to_string(),
                        });
                    }
                }
            }
        }
    }

    let finished = matches!(
        choice["finish_reason"].as_str(),
        Some("stop" | "tool_calls" | "length")
    );
    (chunks, finished)
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn stream(
        &self,
        request: &ModelRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = self.request_body(request);

        let resp = retry_with_backoff(
            &self.retry,
            "chat_completions",
            |_attempt| {
                let mut builder = self.http.post(&url).json(&body);
                if let Some(key) = &self.api_key {
                    builder = builder.bearer_auth(key);
                }
                builder.send()
            },
            classify_response,
        )
        .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let mut stream = resp.bytes_stream();
        let mut sse = SseBuffer::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for data in sse.push(&chunk) {
                if data == "[DONE]" {
                    let _ = tx.send(StreamChunk::Done).await;
                    return Ok(());
                }
                let Ok(json) = serde_json::from_str::<Value>(&data) else {
                    tracing::debug!(payload = %data, "Skipping unparsable SSE payload");
                    continue;
                };
                if let Some(message) = json["error"]["message"].as_str() {
                    return Err(ProviderError::Stream(message.to_string()));
                }
                let (chunks, finished) = chunks_from_event(&json);
                for chunk in chunks {
                    if tx.send(chunk).await.is_err() {
                        // Receiver gone: the turn was abandoned
                        return Ok(());
                    }
                }
                if finished {
                    let _ = tx.send(StreamChunk::Done).await;
                    return Ok(());
                }
            }
        }

        let _ = tx.send(StreamChunk::Done).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ToolCallRequest, ToolDefinition};

    #[test]
    fn sse_buffer_handles_split_events() {
        let mut sse = SseBuffer::new();
        assert!(sse.push(b"data: {\"a\":").is_empty());
        assert_eq!(sse.push(b"1}\n\ndata: [DONE]\n\n"), vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn sse_buffer_keeps_characters_split_across_reads() {
        let event = "data: {\"delta\":{\"content\":\"café\"}}\n\n".as_bytes();
        let cut = event.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut sse = SseBuffer::new();
        assert!(sse.push(&event[..cut]).is_empty());
        let payloads = sse.push(&event[cut..]);
        assert_eq!(payloads.len(), 1);
        let json: Value = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(json["delta"]["content"], "café");
    }

    #[test]
    fn sse_buffer_normalizes_crlf() {
        let mut sse = SseBuffer::new();
        assert_eq!(sse.push(b"data: x\r\n\r\n"), vec!["x"]);
    }

    #[test]
    fn text_delta_event() {
        let json: Value = serde_json::from_str(
            r#"{"choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#,
        )
        .unwrap();
        let (chunks, finished) = chunks_from_event(&json);
        assert_eq!(chunks, vec![StreamChunk::Text("Hello".into())]);
        assert!(!finished);
    }

    #[test]
    fn tool_call_start_and_arguments() {
        let json: Value = serde_json::from_str(
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_prd","arguments":"{\"title\":"}}]}}]}"#,
        )
        .unwrap();
        let (chunks, _) = chunks_from_event(&json);
        assert_eq!(
            chunks,
            vec![
                StreamChunk::ToolCallStart {
                    index: 0,
                    id: "call_1".into(),
                    name: "get_prd".into()
                },
                StreamChunk::ToolCallDelta {
                    index: 0,
                    arguments: "{\"title\":".into()
                },
            ]
        );
    }

    #[test]
    fn finish_reason_ends_step() {
        let json: Value =
            serde_json::from_str(r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#)
                .unwrap();
        let (chunks, finished) = chunks_from_event(&json);
        assert!(chunks.is_empty());
        assert!(finished);
    }

    #[test]
    fn request_body_includes_tools_and_tool_messages() {
        let provider = OpenAiProvider::new("http://localhost:1234/v1/", "test-model", None);
        let req = ModelRequest {
            messages: vec![
                ModelMessage::System("sys".into()),
                ModelMessage::User("hi".into()),
                ModelMessage::Assistant {
                    content: String::new(),
                    tool_calls: vec![ToolCallRequest {
                        id: "c1".into(),
                        name: "get_note".into(),
                        arguments: "{}".into(),
                    }],
                },
                ModelMessage::Tool {
                    tool_call_id: "c1".into(),
                    content: "{\"ok\":true}".into(),
                },
            ],
            tools: vec![ToolDefinition {
                name: "get_note".into(),
                description: "Read a note".into(),
                parameters: json!({"type": "object"}),
            }],
        };
        let body = provider.request_body(&req);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 4);
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "get_note");
        assert_eq!(body["messages"][3]["tool_call_id"], "c1");
        assert_eq!(body["tools"][0]["function"]["name"], "get_note");
    }
}
