/// Chat transport for the widget
///
/// This module talks to the chat proxy and decodes its event stream.
///
/// # Architecture
///
/// - `client` - `ChatBackend` seam and the HTTP implementation
/// - `sse` - incremental decoder for `data:` frames
/// - `payload` - request/response shapes shared with the proxy
/// - `scripted` - deterministic backend for tests and offline runs
///
/// # Usage
///
/// ```rust,no_run
/// use fieldchat::ai::{ChatBackend, HttpBackend};
/// use fieldchat::config::WidgetConfig;
/// use fieldchat::types::ChatMessage;
///
/// # async fn example() -> Result<(), fieldchat::ai::ChatError> {
/// let backend = HttpBackend::new(&WidgetConfig::from_env())?;
/// let stream = backend.open_stream(&[ChatMessage::user("Hello!")]).await?;
/// # drop(stream);
/// # Ok(())
/// # }
/// ```
mod client;
pub mod payload;
mod scripted;
pub mod sse;

// Re-export main types
pub use client::{ByteStream, ChatBackend, ChatError, ChatResult, HttpBackend};
pub use scripted::{ScriptStep, ScriptedBackend};
pub use sse::{SseDecoder, StreamEvent};
