//! Wire shapes exchanged with the chat proxy.

use crate::types::ChatMessage;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`.
#[derive(Serialize)]
pub struct ChatRequest<'a> {
    pub messages: &'a [ChatMessage],
}

/// One `data:` frame of the response stream.
#[derive(Deserialize, Debug, Default)]
pub struct ChatDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error body returned by the proxy, e.g. when upstream credentials are missing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    pub error: String,
}

impl ErrorPayload {
    /// Pull a readable message out of an error response body.
    pub fn message_from_body(body: &str) -> String {
        match serde_json::from_str::<ErrorPayload>(body) {
            Ok(payload) => payload.error,
            Err(_) => body.trim().to_string(),
        }
    }
}
