//! A provider that replays canned steps. Used by tests and by the gateway's
//! `--offline` mode.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use super::{ModelProvider, ModelRequest, StreamChunk};
use crate::error::ProviderError;

#[derive(Debug, Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Vec<StreamChunk>>>,
    requests: Mutex<Vec<ModelRequest>>,
    fallback: Option<String>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Vec<StreamChunk>>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
            fallback: None,
        }
    }

    /// A provider that answers every step by echoing the last user message
    /// after `prefix`.
    pub fn echo(prefix: impl Into<String>) -> Self {
        Self {
            fallback: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// Requests seen so far, in order.
    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().await.clone()
    }
}

fn last_user_message(request: &ModelRequest) -> &str {
    request
        .messages
        .iter()
        .rev()
        .find_map(|m| match m {
            super::ModelMessage::User(text) => Some(text.as_str()),
            _ => None,
        })
        .unwrap_or_default()
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(
        &self,
        request: &ModelRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        self.requests.lock().await.push(request.clone());

        let step = self.steps.lock().await.pop_front();
        let chunks = match (step, &self.fallback) {
            (Some(chunks), _) => chunks,
            (None, Some(prefix)) => {
                let reply = format!("{prefix}{}", last_user_message(request));
                // Split into word-sized pieces so clients see a real stream
                reply
                    .split_inclusive(' ')
                    .map(|piece| StreamChunk::Text(piece.to_string()))
                    .collect()
            }
            (None, None) => {
                return Err(ProviderError::Stream("script exhausted".to_string()));
            }
        };

        for chunk in chunks {
            if tx.send(chunk).await.is_err() {
                return Ok(());
            }
        }
        let _ = tx.send(StreamChunk::Done).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ModelMessage;

    #[tokio::test]
    async fn replays_steps_in_order() {
        let provider = ScriptedProvider::new(vec![
            vec![StreamChunk::Text("one".into())],
            vec![StreamChunk::Text("two".into())],
        ]);
        for expected in ["one", "two"] {
            let (tx, mut rx) = mpsc::channel(8);
            provider.stream(&ModelRequest::default(), tx).await.unwrap();
            assert_eq!(rx.recv().await, Some(StreamChunk::Text(expected.into())));
            assert_eq!(rx.recv().await, Some(StreamChunk::Done));
        }
        let (tx, _rx) = mpsc::channel(8);
        assert!(provider.stream(&ModelRequest::default(), tx).await.is_err());
        assert_eq!(provider.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn echo_mode_streams_words() {
        let provider = ScriptedProvider::echo("You said: ");
        let request = ModelRequest {
            messages: vec![ModelMessage::User("hello there".into())],
            tools: vec![],
        };
        let (tx, mut rx) = mpsc::channel(16);
        provider.stream(&request, tx).await.unwrap();
        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            if let StreamChunk::Text(t) = chunk {
                text.push_str(&t);
            }
        }
        assert_eq!(text, "You said: hello there");
    }
}
