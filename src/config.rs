//! Runtime configuration, read from the environment.

use std::env;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/chat";
pub const DEFAULT_STORAGE_KEY: &str = "fieldchat_conversation";
/// Display text shorter than this is replaced by a write confirmation.
pub const DEFAULT_SUMMARY_THRESHOLD: usize = 50;
/// Stored conversations older than this are discarded on load.
pub const DEFAULT_HISTORY_TTL: Duration = Duration::from_secs(8 * 60 * 60);

#[derive(Clone, Debug, PartialEq)]
pub struct WidgetConfig {
    /// Chat proxy URL receiving `POST { messages }`.
    pub endpoint: String,
    /// Optional bearer token sent to the proxy.
    pub api_key: Option<String>,
    pub storage_key: String,
    pub connect_timeout: Duration,
    pub summary_threshold: usize,
    pub history_ttl: Duration,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            connect_timeout: Duration::from_secs(30),
            summary_threshold: DEFAULT_SUMMARY_THRESHOLD,
            history_ttl: DEFAULT_HISTORY_TTL,
        }
    }
}

impl WidgetConfig {
    /// Load from `FIELDCHAT_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("FIELDCHAT_ENDPOINT").unwrap_or(defaults.endpoint),
            api_key: env::var("FIELDCHAT_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            storage_key: env::var("FIELDCHAT_STORAGE_KEY").unwrap_or(defaults.storage_key),
            connect_timeout: env::var("FIELDCHAT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            summary_threshold: defaults.summary_threshold,
            history_ttl: defaults.history_ttl,
        }
    }
}
