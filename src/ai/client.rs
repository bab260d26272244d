use super::payload::{ChatRequest, ErrorPayload};
use crate::config::WidgetConfig;
use crate::types::ChatMessage;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;

// ============================================
// Error Types
// ============================================

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("chat endpoint error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stream error: {0}")]
    Stream(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Raw response body, one item per transport read.
pub type ByteStream = BoxStream<'static, ChatResult<Vec<u8>>>;

/// A completion endpoint that answers with an event stream.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the conversation and return the response body as it arrives.
    ///
    /// A non-success status is reported here, before any bytes are streamed.
    async fn open_stream(&self, messages: &[ChatMessage]) -> ChatResult<ByteStream>;
}

/// Streams completions from the chat proxy over HTTP.
pub struct HttpBackend {
    client: Client,
    endpoint: reqwest::Url,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &WidgetConfig) -> ChatResult<Self> {
        let endpoint = reqwest::Url::parse(&config.endpoint).map_err(|err| {
            ChatError::Config(format!("invalid chat endpoint {:?}: {err}", config.endpoint))
        })?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn open_stream(&self, messages: &[ChatMessage]) -> ChatResult<ByteStream> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("accept", "text/event-stream")
            .json(&ChatRequest { messages });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                message: ErrorPayload::message_from_body(&body),
            });
        }

        tracing::debug!(%status, "chat stream opened");
        Ok(response
            .bytes_stream()
            .map(|item| item.map(|bytes| bytes.to_vec()).map_err(ChatError::from))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparseable_endpoint() {
        let config = WidgetConfig {
            endpoint: "not a url".to_string(),
            ..WidgetConfig::default()
        };
        match HttpBackend::new(&config) {
            Err(ChatError::Config(message)) => assert!(message.contains("not a url")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("endpoint should be rejected"),
        }
    }

    #[test]
    fn accepts_default_endpoint() {
        let backend = HttpBackend::new(&WidgetConfig::default()).unwrap();
        assert_eq!(backend.endpoint(), "http://127.0.0.1:3000/api/chat");
    }

    #[test]
    fn status_error_message_includes_code() {
        let err = ChatError::Status {
            status: 502,
            message: "upstream unavailable".into(),
        };
        assert_eq!(err.to_string(), "chat endpoint error 502: upstream unavailable");
    }

    #[test]
    fn each_variant_names_its_own_failure() {
        assert_eq!(
            ChatError::Config("bad url".into()).to_string(),
            "configuration error: bad url"
        );
        assert_eq!(
            ChatError::Stream("reset".into()).to_string(),
            "stream error: reset"
        );
    }
}
