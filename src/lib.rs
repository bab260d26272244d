//! Embeddable chat widget that can read and write form fields on its host page.
//!
//! The model edits fields through inline directives in its replies, which are
//! resolved once the streamed reply is complete. See [`widget::ChatWidget`].

pub mod ai;
pub mod config;
pub mod conversation;
pub mod directives;
pub mod fields;
pub mod prompt;
pub mod render;
pub mod storage;
pub mod types;
#[cfg(any(feature = "web", feature = "desktop"))]
pub mod views;
pub mod widget;

pub use ai::{ChatBackend, ChatError, ChatResult, HttpBackend};
pub use config::WidgetConfig;
pub use conversation::{Conversation, ConversationState};
pub use fields::{FieldAccessor, HostDocument, MemoryDocument};
pub use widget::{CancelHandle, ChatWidget, TurnOutcome, TurnPhase};
