//! HTTP client for the chat gateway.
//!
//! One POST per user turn. The streamed body is fed through a
//! [`StreamDecoder`] chunk by chunk so front ends can render text and tool
//! activity while the turn is still running.

mod conversation;

pub use conversation::{Conversation, DUPLICATE_WINDOW};

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::{
    Channel, ChatReply, ChatRequest, DecodedStream, DecoderUpdate, StreamDecoder, StreamMetadata,
};

pub struct AgentClient {
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
    channel: Channel,
    user_id: Option<String>,
    approval_mode: bool,
}

impl AgentClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let url = Url::parse(&config.gateway_url)
            .map_err(|_| ClientError::InvalidUrl(config.gateway_url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(config.gateway_url.clone()));
        }

        let timeout = config.timeout();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self {
            http,
            url,
            timeout,
            channel: config.channel,
            user_id: config.user_id.clone(),
            approval_mode: config.approval_mode,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn approval_mode(&self) -> bool {
        self.approval_mode
    }

    pub fn set_approval_mode(&mut self, enabled: bool) {
        self.approval_mode = enabled;
    }

    /// The request body for `message`, carrying the conversation's prior
    /// history.
    pub fn build_request(&self, message: &str, conversation: &Conversation) -> ChatRequest {
        ChatRequest {
            channel: self.channel,
            message: message.to_string(),
            context: Some(conversation.request_context(self.approval_mode)),
            user_id: self.user_id.clone(),
        }
    }

    async fn post(
        &self,
        request: &ChatRequest,
        content_type: &'static str,
    ) -> Result<reqwest::Response, ClientError> {
        let body = serde_json::to_vec(request)?;
        let resp = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.timeout))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Send one turn and stream the reply.
    ///
    /// `on_update` runs synchronously for every decoded update, in stream
    /// order. On success the conversation absorbs the turn. On failure the
    /// conversation is left untouched; whatever `on_update` already received
    /// is all the caller gets.
    #[instrument(skip(self, conversation, on_update), fields(session = %conversation.session_id()))]
    pub async fn send_turn<F>(
        &self,
        message: &str,
        conversation: &mut Conversation,
        mut on_update: F,
    ) -> Result<DecodedStream, ClientError>
    where
        F: FnMut(&DecoderUpdate),
    {
        let request = self.build_request(message, conversation);
        let resp = self.post(&request, "application/json").await?;

        let mut decoder = StreamDecoder::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ClientError::from_reqwest(e, self.timeout))?;
            for update in decoder.push(&chunk) {
                on_update(&update);
            }
        }
        for update in decoder.finish() {
            on_update(&update);
        }

        let decoded = decoder.into_decoded();
        debug!(
            content_len = decoded.content.len(),
            tool_events = decoded.tool_events.len(),
            has_metadata = decoded.metadata.is_some(),
            "Turn decoded"
        );
        conversation.apply_turn(message, &decoded);
        Ok(decoded)
    }

    /// Send one turn and wait for the buffered JSON reply.
    pub async fn send_buffered(
        &self,
        message: &str,
        conversation: &mut Conversation,
    ) -> Result<ChatReply, ClientError> {
        let request = self.build_request(message, conversation);
        let resp = self.post(&request, "text/plain").await?;
        let reply: ChatReply = resp
            .json()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.timeout))?;

        // The buffered reply carries no history; keep ours and adopt the id
        let decoded = DecodedStream {
            content: reply.content.clone(),
            metadata: Some(StreamMetadata {
                session_id: reply.session_id.clone(),
                conversation_history: Vec::new(),
                needs_approval: reply.needs_approval,
            }),
            ..Default::default()
        };
        conversation.apply_turn(message, &decoded);
        info!(session = %reply.session_id, "Buffered reply received");
        Ok(reply)
    }
}
