//! Conversation log with expiring persistence.
//!
//! Only the message list is persisted, stamped with the time of the write.
//! Loading a record older than the configured lifetime discards it.

use crate::config::{DEFAULT_HISTORY_TTL, DEFAULT_STORAGE_KEY};
use crate::storage::KeyValueStore;
use crate::types::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Milliseconds since the Unix epoch.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(now_ms)
}

pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Serialize, Deserialize)]
struct PersistedRecord {
    messages: Vec<ChatMessage>,
    timestamp: i64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    pub is_loading: bool,
    pub error: Option<String>,
}

pub struct Conversation<S> {
    state: ConversationState,
    store: S,
    key: String,
    ttl_ms: i64,
    clock: Clock,
    clear_pending: bool,
}

impl<S: KeyValueStore> Conversation<S> {
    /// Hydrate from `store` under the default key and lifetime.
    pub fn load(store: S) -> Self {
        Self::load_with(store, DEFAULT_STORAGE_KEY, DEFAULT_HISTORY_TTL, system_clock())
    }

    pub fn load_with(store: S, key: &str, ttl: Duration, clock: Clock) -> Self {
        let mut conversation = Self {
            state: ConversationState::default(),
            store,
            key: key.to_string(),
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
            clear_pending: false,
        };
        conversation.state.messages = conversation.read_record();
        conversation
    }

    fn read_record(&self) -> Vec<ChatMessage> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(%err, "failed to read conversation history");
                return Vec::new();
            }
        };

        let record = match serde_json::from_str::<PersistedRecord>(&raw) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(%err, "discarding unreadable conversation history");
                self.discard_record();
                return Vec::new();
            }
        };

        let age = (self.clock)().saturating_sub(record.timestamp);
        if age > self.ttl_ms {
            tracing::info!(age_ms = age, "conversation history expired");
            self.discard_record();
            return Vec::new();
        }

        record.messages
    }

    fn discard_record(&self) {
        if let Err(err) = self.store.remove(&self.key) {
            tracing::warn!(%err, "failed to remove conversation history");
        }
    }

    /// Write the message log. Failures are logged, never surfaced.
    pub fn persist(&self) {
        let record = PersistedRecord {
            messages: self.state.messages.clone(),
            timestamp: (self.clock)(),
        };
        let result = serde_json::to_string(&record)
            .map_err(|err| err.to_string())
            .and_then(|json| self.store.set(&self.key, &json).map_err(|err| err.to_string()));
        if let Err(err) = result {
            tracing::warn!(%err, "failed to persist conversation history");
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.state.messages
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    /// Push a message and persist.
    pub fn append(&mut self, message: ChatMessage) {
        self.state.messages.push(message);
        self.persist();
    }

    // ---------------
    // Clearing (two-step)
    // ---------------

    /// First step of clearing: arm the confirmation.
    pub fn request_clear(&mut self) {
        self.clear_pending = true;
    }

    pub fn cancel_clear(&mut self) {
        self.clear_pending = false;
    }

    pub fn is_clear_pending(&self) -> bool {
        self.clear_pending
    }

    /// Second step of clearing. Does nothing unless [`Self::request_clear`] came first.
    pub fn confirm_clear(&mut self) -> bool {
        if !self.clear_pending {
            return false;
        }
        self.clear_pending = false;
        self.state.messages.clear();
        self.state.error = None;
        self.persist();
        true
    }

    // ---------------
    // Turn bookkeeping
    // ---------------

    /// Open an empty assistant message for streaming. Not persisted.
    pub(crate) fn open_assistant(&mut self) -> usize {
        self.state.messages.push(ChatMessage::assistant(String::new()));
        self.state.messages.len() - 1
    }

    pub(crate) fn message(&self, index: usize) -> Option<&ChatMessage> {
        self.state.messages.get(index)
    }

    pub(crate) fn push_content(&mut self, index: usize, delta: &str) {
        if let Some(msg) = self.state.messages.get_mut(index) {
            msg.content.push_str(delta);
        }
    }

    pub(crate) fn set_content(&mut self, index: usize, content: String) {
        if let Some(msg) = self.state.messages.get_mut(index) {
            msg.content = content;
        }
    }

    /// Drop the open assistant message of an aborted turn.
    pub(crate) fn discard(&mut self, index: usize) {
        if matches!(self.message(index), Some(msg) if msg.role == Role::Assistant) {
            self.state.messages.remove(index);
        }
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.state.is_loading = loading;
    }

    pub(crate) fn set_error(&mut self, error: Option<String>) {
        self.state.error = error;
    }
}
