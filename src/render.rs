//! Presentation sink for the widget.
//!
//! The widget pushes state here; nothing flows back. Markdown is handed to
//! `comrak` as is.

use crate::conversation::ConversationState;
use crate::types::{ChatMessage, FieldNotice, Role};
use comrak::plugins::syntect::SyntectAdapter;
use comrak::{ComrakOptions, ComrakPlugins, markdown_to_html_with_plugins};
use once_cell::sync::Lazy;

static MARKDOWN_OPTIONS: Lazy<ComrakOptions> = Lazy::new(|| {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.tasklist = true;
    options.extension.autolink = true;
    options
});

pub fn markdown_to_html(md: &str) -> String {
    let adapter = SyntectAdapter::new(Some("base16-ocean.dark"));
    let mut plugins = ComrakPlugins::default();
    plugins.render.codefence_syntax_highlighter = Some(&adapter);
    markdown_to_html_with_plugins(md, &MARKDOWN_OPTIONS, &plugins)
}

pub trait ChatRenderer {
    /// One message changed; called for every streamed delta.
    fn render_message(&mut self, _index: usize, _message: &ChatMessage) {}

    /// The message list changed shape (append, removal, clear).
    fn render_all(&mut self, _state: &ConversationState) {}

    /// Field writes from a finished turn, aggregated.
    fn notify_fields(&mut self, _notice: &FieldNotice) {}
}

/// Discards everything.
pub struct NullRenderer;

impl ChatRenderer for NullRenderer {}

/// Keeps an HTML rendering of every message, plus the latest notice and error.
#[derive(Debug, Default)]
pub struct HtmlTranscript {
    pub rows: Vec<String>,
    pub notice: Option<String>,
    pub error: Option<String>,
    pub loading: bool,
}

impl HtmlTranscript {
    fn row(message: &ChatMessage) -> String {
        match message.role {
            Role::Assistant => format!(
                "<div class=\"bubble assistant\"><div class=\"md\">{}</div></div>",
                markdown_to_html(&message.content)
            ),
            Role::User => format!(
                "<div class=\"bubble user\">{}</div>",
                escape_html(&message.content)
            ),
            Role::System => String::new(),
        }
    }
}

impl ChatRenderer for HtmlTranscript {
    fn render_message(&mut self, index: usize, message: &ChatMessage) {
        let row = Self::row(message);
        match self.rows.get_mut(index) {
            Some(slot) => *slot = row,
            None => {
                self.rows.resize(index, String::new());
                self.rows.push(row);
            }
        }
    }

    fn render_all(&mut self, state: &ConversationState) {
        self.rows = state.messages.iter().map(Self::row).collect();
        self.error = state.error.clone();
        self.loading = state.is_loading;
    }

    fn notify_fields(&mut self, notice: &FieldNotice) {
        self.notice = Some(notice.summary());
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_rows_render_markdown() {
        let mut transcript = HtmlTranscript::default();
        transcript.render_message(1, &ChatMessage::assistant("**bold**"));
        assert_eq!(transcript.rows.len(), 2);
        assert!(transcript.rows[1].contains("<strong>bold</strong>"));
    }

    #[test]
    fn user_rows_are_escaped() {
        let mut transcript = HtmlTranscript::default();
        let state = ConversationState {
            messages: vec![ChatMessage::user("<b>x</b>")],
            is_loading: true,
            error: None,
        };
        transcript.render_all(&state);
        assert!(transcript.rows[0].contains("&lt;b&gt;x&lt;/b&gt;"));
        assert!(transcript.loading);
    }
}
