//! The chat widget: one conversation bound to one host document.
//!
//! A turn moves through `Idle → Sending → Streaming → Finalizing → Idle`.
//! A transport failure before the stream completes goes through `Errored`
//! back to `Idle`; the open assistant message is dropped and nothing retries.

use crate::ai::{ChatBackend, ChatError, SseDecoder, StreamEvent};
use crate::config::{DEFAULT_SUMMARY_THRESHOLD, WidgetConfig};
use crate::conversation::{Conversation, ConversationState};
use crate::directives::{extract_write_directives, resolve_read_directives, strip_write_directives};
use crate::fields::{FieldAccessor, HostDocument};
use crate::prompt::system_message;
use crate::render::{ChatRenderer, NullRenderer};
use crate::storage::KeyValueStore;
use crate::types::{ChatMessage, FieldNotice, FieldWriteResult};
use futures::StreamExt;
use futures::future::{AbortHandle, Abortable};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Sending,
    Streaming,
    Finalizing,
    Errored,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Empty input, or a turn was already in flight.
    Rejected,
    Completed { writes: Vec<FieldWriteResult> },
    Failed(String),
    Cancelled,
}

/// A turn that has been started but not yet resolved.
#[derive(Debug)]
pub struct PreparedTurn {
    assistant_index: usize,
    request: Vec<ChatMessage>,
}

impl PreparedTurn {
    /// Messages to send, led by the synthesized system message.
    pub fn request(&self) -> &[ChatMessage] {
        &self.request
    }

    pub fn assistant_index(&self) -> usize {
        self.assistant_index
    }
}

/// Aborts the turn currently streaming, if any.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    slot: Arc<Mutex<Option<AbortHandle>>>,
}

impl CancelHandle {
    /// Returns whether a turn was in flight.
    pub fn cancel(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match slot.as_ref() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn arm(&self, handle: Option<AbortHandle>) {
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = handle;
    }
}

pub struct ChatWidget<D, S> {
    fields: FieldAccessor<D>,
    conversation: Conversation<S>,
    backend: Arc<dyn ChatBackend>,
    renderer: Box<dyn ChatRenderer + Send>,
    phase: TurnPhase,
    summary_threshold: usize,
    cancel: CancelHandle,
}

impl<D: HostDocument, S: KeyValueStore> ChatWidget<D, S> {
    pub fn new(document: D, conversation: Conversation<S>, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            fields: FieldAccessor::new(document),
            conversation,
            backend,
            renderer: Box::new(NullRenderer),
            phase: TurnPhase::Idle,
            summary_threshold: DEFAULT_SUMMARY_THRESHOLD,
            cancel: CancelHandle::default(),
        }
    }

    pub fn with_config(mut self, config: &WidgetConfig) -> Self {
        self.summary_threshold = config.summary_threshold;
        self
    }

    pub fn with_renderer(mut self, renderer: impl ChatRenderer + Send + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self.renderer.render_all(self.conversation.state());
        self
    }

    pub fn state(&self) -> &ConversationState {
        self.conversation.state()
    }

    pub fn conversation(&self) -> &Conversation<S> {
        &self.conversation
    }

    pub fn fields(&self) -> &FieldAccessor<D> {
        &self.fields
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn into_document(self) -> D {
        self.fields.into_document()
    }

    /// Run a whole turn: send `text`, stream the reply, apply field writes.
    pub async fn send(&mut self, text: &str) -> TurnOutcome {
        let Some(turn) = self.begin_turn(text) else {
            return TurnOutcome::Rejected;
        };

        let backend = self.backend.clone();
        let (abort, registration) = AbortHandle::new_pair();
        self.cancel.arm(Some(abort));

        let consume = async {
            let mut stream = backend.open_stream(turn.request()).await?;
            let mut decoder = SseDecoder::default();
            while let Some(chunk) = stream.next().await {
                for event in decoder.feed(&chunk?) {
                    match event {
                        StreamEvent::Delta(piece) => self.apply_delta(&turn, &piece),
                        StreamEvent::Done => return Ok(()),
                    }
                }
            }
            for event in decoder.finish() {
                if let StreamEvent::Delta(piece) = event {
                    self.apply_delta(&turn, &piece);
                }
            }
            Ok::<(), ChatError>(())
        };
        let result = Abortable::new(consume, registration).await;
        self.cancel.arm(None);

        match result {
            Ok(Ok(())) => TurnOutcome::Completed {
                writes: self.finish_turn(turn),
            },
            Ok(Err(err)) => {
                let message = err.to_string();
                self.fail_turn(turn, &err);
                TurnOutcome::Failed(message)
            }
            Err(_aborted) => {
                self.cancel_turn(turn);
                TurnOutcome::Cancelled
            }
        }
    }

    /// `Idle → Sending`. Returns `None` (and changes nothing) for empty input
    /// or while another turn is loading.
    pub fn begin_turn(&mut self, text: &str) -> Option<PreparedTurn> {
        let trimmed = text.trim();
        if trimmed.is_empty() || self.conversation.is_loading() {
            return None;
        }
        self.conversation.cancel_clear();

        let fields = &self.fields;
        let content = resolve_read_directives(trimmed, |id| fields.read(id));
        self.conversation.append(ChatMessage::user(content));

        let mut request = Vec::with_capacity(self.conversation.messages().len() + 1);
        request.push(system_message(&self.fields.list_fields()));
        request.extend(self.conversation.messages().iter().cloned());

        let assistant_index = self.conversation.open_assistant();
        self.conversation.set_loading(true);
        self.conversation.set_error(None);
        self.phase = TurnPhase::Sending;
        self.renderer.render_all(self.conversation.state());

        Some(PreparedTurn {
            assistant_index,
            request,
        })
    }

    /// `Streaming`: append a delta to the open message and re-render only it.
    pub fn apply_delta(&mut self, turn: &PreparedTurn, delta: &str) {
        self.phase = TurnPhase::Streaming;
        self.conversation.push_content(turn.assistant_index, delta);
        if let Some(message) = self.conversation.message(turn.assistant_index) {
            self.renderer.render_message(turn.assistant_index, message);
        }
    }

    /// `Finalizing → Idle`: resolve write directives on the full text, compute
    /// the display copy, then persist.
    pub fn finish_turn(&mut self, turn: PreparedTurn) -> Vec<FieldWriteResult> {
        self.phase = TurnPhase::Finalizing;
        let raw = self
            .conversation
            .message(turn.assistant_index)
            .map(|msg| msg.content.clone())
            .unwrap_or_default();

        let writes: Vec<FieldWriteResult> = extract_write_directives(&raw)
            .into_iter()
            .map(|directive| {
                let success = self.fields.write(&directive.field, &directive.content);
                FieldWriteResult {
                    field: directive.field,
                    content: directive.content,
                    success,
                }
            })
            .collect();

        let notice = FieldNotice::from_results(&writes);
        let mut display = strip_write_directives(&raw).trim().to_string();
        if display.chars().count() < self.summary_threshold && !notice.updated.is_empty() {
            display = confirmation_message(&notice.updated);
        }

        self.conversation.set_content(turn.assistant_index, display);
        self.conversation.set_loading(false);
        self.conversation.persist();
        self.phase = TurnPhase::Idle;

        self.renderer.render_all(self.conversation.state());
        if !notice.is_empty() {
            self.renderer.notify_fields(&notice);
        }
        tracing::info!(
            updated = notice.updated.len(),
            failed = notice.failed.len(),
            "turn completed"
        );
        writes
    }

    /// `Errored → Idle`: drop the open message and surface the error.
    pub fn fail_turn(&mut self, turn: PreparedTurn, error: &ChatError) {
        self.phase = TurnPhase::Errored;
        tracing::warn!(%error, "turn failed");
        self.conversation.discard(turn.assistant_index);
        self.conversation.set_loading(false);
        self.conversation.set_error(Some(error.to_string()));
        self.conversation.persist();
        self.renderer.render_all(self.conversation.state());
        self.phase = TurnPhase::Idle;
    }

    /// Drop the open message of a cancelled turn without surfacing an error.
    pub fn cancel_turn(&mut self, turn: PreparedTurn) {
        tracing::info!("turn cancelled");
        self.conversation.discard(turn.assistant_index);
        self.conversation.set_loading(false);
        self.conversation.persist();
        self.renderer.render_all(self.conversation.state());
        self.phase = TurnPhase::Idle;
    }

    pub fn dismiss_error(&mut self) {
        self.conversation.set_error(None);
        self.renderer.render_all(self.conversation.state());
    }

    /// First step of clearing. Ignored while a turn is in flight.
    pub fn request_clear(&mut self) {
        if !self.conversation.is_loading() {
            self.conversation.request_clear();
        }
    }

    pub fn cancel_clear(&mut self) {
        self.conversation.cancel_clear();
    }

    pub fn is_clear_pending(&self) -> bool {
        self.conversation.is_clear_pending()
    }

    /// Second step of clearing. Returns whether the log was cleared.
    pub fn confirm_clear(&mut self) -> bool {
        if self.conversation.is_loading() || !self.conversation.confirm_clear() {
            return false;
        }
        self.renderer.render_all(self.conversation.state());
        true
    }
}

/// Reply shown in place of a response that was little more than field writes.
pub fn confirmation_message(fields: &[String]) -> String {
    let mut unique: Vec<&str> = Vec::new();
    for field in fields {
        if !unique.contains(&field.as_str()) {
            unique.push(field);
        }
    }

    match unique.as_slice() {
        [] => String::new(),
        [one] => format!("I've updated the \"{one}\" field."),
        many => {
            let quoted: Vec<String> = many.iter().map(|f| format!("\"{f}\"")).collect();
            format!("I've updated the following fields: {}.", quoted.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ScriptStep, ScriptedBackend};
    use crate::fields::{MemoryDocument, MemoryElement};
    use crate::storage::MemoryStore;
    use crate::types::Role;

    fn widget(backend: ScriptedBackend) -> ChatWidget<MemoryDocument, MemoryStore> {
        let document = MemoryDocument::new(vec![
            MemoryElement::input("title", "text", "Hello"),
            MemoryElement::textarea("body", ""),
        ]);
        ChatWidget::new(
            document,
            Conversation::load(MemoryStore::new()),
            Arc::new(backend),
        )
    }

    #[test]
    fn confirmation_names_fields() {
        assert_eq!(
            confirmation_message(&["title".into()]),
            "I've updated the \"title\" field."
        );
        assert_eq!(
            confirmation_message(&["a".into(), "b".into(), "a".into()]),
            "I've updated the following fields: \"a\", \"b\"."
        );
    }

    #[test]
    fn send_while_loading_is_a_no_op() {
        let mut widget = widget(ScriptedBackend::from_deltas(&[]));
        let first = widget.begin_turn("one");
        assert!(first.is_some());
        let count = widget.state().messages.len();
        assert!(widget.begin_turn("two").is_none());
        assert_eq!(widget.state().messages.len(), count);
    }

    #[test]
    fn begin_turn_resolves_reads_and_builds_request() {
        let mut widget = widget(ScriptedBackend::from_deltas(&[]));
        let turn = widget.begin_turn("check [READ_FIELD:title]").unwrap();
        assert_eq!(widget.phase(), TurnPhase::Sending);
        assert!(widget.state().is_loading);

        let request = turn.request();
        assert_eq!(request[0].role, Role::System);
        assert!(request[0].content.contains("- title (type: text): \"Hello\""));
        assert_eq!(
            request[1].content,
            "check [Field \"title\" contains: \"Hello\"]"
        );
        assert_eq!(request.len(), 2);
        assert_eq!(widget.state().messages[turn.assistant_index()].content, "");
    }

    #[test]
    fn short_reply_with_write_is_replaced_by_confirmation() {
        let mut widget = widget(ScriptedBackend::from_deltas(&[]));
        let turn = widget.begin_turn("set title").unwrap();
        widget.apply_delta(&turn, "Done now. [WRITE_FIELD:title]New[/WRITE_FIELD]");
        let index = turn.assistant_index();
        let writes = widget.finish_turn(turn);

        assert_eq!(writes.len(), 1);
        assert!(writes[0].success);
        assert_eq!(
            widget.state().messages[index].content,
            "I've updated the \"title\" field."
        );
        assert_eq!(widget.fields().read("title").as_deref(), Some("New"));
        assert_eq!(widget.phase(), TurnPhase::Idle);
    }

    #[test]
    fn failed_writes_do_not_trigger_confirmation() {
        let mut widget = widget(ScriptedBackend::from_deltas(&[]));
        let turn = widget.begin_turn("x").unwrap();
        widget.apply_delta(&turn, "Ok [WRITE_FIELD:ghost]v[/WRITE_FIELD]");
        let index = turn.assistant_index();
        let writes = widget.finish_turn(turn);
        assert!(!writes[0].success);
        assert_eq!(widget.state().messages[index].content, "Ok");
    }

    #[tokio::test]
    async fn streamed_turn_completes() {
        let backend = ScriptedBackend::from_deltas(&["Hi ", "there"]);
        let mut widget = widget(backend.clone());
        let outcome = widget.send("hello").await;

        assert_eq!(outcome, TurnOutcome::Completed { writes: vec![] });
        let messages = &widget.state().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Hi there");
        assert!(!widget.state().is_loading);
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_discards_placeholder() {
        let backend = ScriptedBackend::new(vec![
            ScriptStep::Chunk(b"data: {\"content\":\"partial\"}\n\n".to_vec()),
            ScriptStep::Fail("connection reset".into()),
        ]);
        let mut widget = widget(backend);
        let outcome = widget.send("hello").await;

        assert_eq!(
            outcome,
            TurnOutcome::Failed("stream error: connection reset".into())
        );
        assert_eq!(widget.state().messages, vec![ChatMessage::user("hello")]);
        assert!(!widget.state().is_loading);
        assert_eq!(
            widget.state().error.as_deref(),
            Some("stream error: connection reset")
        );
        assert_eq!(widget.phase(), TurnPhase::Idle);

        widget.dismiss_error();
        assert_eq!(widget.state().error, None);
    }

    #[tokio::test]
    async fn cancelled_turn_leaves_no_placeholder() {
        let backend = ScriptedBackend::new(vec![
            ScriptStep::Chunk(b"data: {\"content\":\"slow\"}\n\n".to_vec()),
            ScriptStep::Hang,
        ]);
        let mut widget = widget(backend);
        let cancel = widget.cancel_handle();
        assert!(!cancel.cancel());

        let canceller = async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            cancel.cancel()
        };
        let (outcome, cancelled) = tokio::join!(widget.send("hello"), canceller);

        assert!(cancelled);
        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(widget.state().messages, vec![ChatMessage::user("hello")]);
        assert_eq!(widget.state().error, None);
        assert!(!widget.state().is_loading);
    }

    #[test]
    fn clear_is_blocked_while_loading() {
        let mut widget = widget(ScriptedBackend::from_deltas(&[]));
        let _turn = widget.begin_turn("one").unwrap();
        widget.request_clear();
        assert!(!widget.is_clear_pending());
        assert!(!widget.confirm_clear());
    }
}
