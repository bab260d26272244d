//! Deterministic backend that replays a fixed response.
//!
//! Used by tests and by the terminal front-end's offline mode. It performs no
//! I/O: each step becomes one item of the response stream.

use super::client::{ByteStream, ChatBackend, ChatError, ChatResult};
use super::payload::ErrorPayload;
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// One transport read carrying these bytes.
    Chunk(Vec<u8>),
    /// The transport fails mid-stream.
    Fail(String),
    /// The stream stays open until the turn is cancelled.
    Hang,
}

#[derive(Clone, Debug)]
enum Script {
    Stream(Vec<ScriptStep>),
    Status { status: u16, body: String },
}

/// Replays scripted responses and records every request it receives.
#[derive(Clone, Debug)]
pub struct ScriptedBackend {
    script: Script,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            script: Script::Stream(steps),
            requests: Arc::default(),
        }
    }

    /// Answer with well-formed `data:` frames for each delta, then `[DONE]`.
    pub fn from_deltas(deltas: &[&str]) -> Self {
        let mut steps: Vec<ScriptStep> = deltas
            .iter()
            .map(|delta| {
                let frame = serde_json::json!({ "content": delta });
                ScriptStep::Chunk(format!("data: {frame}\n\n").into_bytes())
            })
            .collect();
        steps.push(ScriptStep::Chunk(b"data: [DONE]\n\n".to_vec()));
        Self::new(steps)
    }

    /// Answer every request with the given non-success status.
    pub fn failing_status(status: u16, body: &str) -> Self {
        Self {
            script: Script::Status {
                status,
                body: body.to_string(),
            },
            requests: Arc::default(),
        }
    }

    /// Every conversation sent so far, system message included.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn open_stream(&self, messages: &[ChatMessage]) -> ChatResult<ByteStream> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        let steps = match &self.script {
            Script::Status { status, body } => {
                return Err(ChatError::Status {
                    status: *status,
                    message: ErrorPayload::message_from_body(body),
                });
            }
            Script::Stream(steps) => steps.clone(),
        };

        let stream = futures::stream::iter(steps).then(|step| async move {
            match step {
                ScriptStep::Chunk(bytes) => Ok(bytes),
                ScriptStep::Fail(message) => Err(ChatError::Stream(message)),
                ScriptStep::Hang => futures::future::pending().await,
            }
        });
        Ok(stream.boxed())
    }
}
