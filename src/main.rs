use anyhow::Context;
use fieldchat::ai::{ChatBackend, HttpBackend, ScriptedBackend};
use fieldchat::conversation::{Conversation, ConversationState, system_clock};
use fieldchat::render::ChatRenderer;
use fieldchat::storage::FileStore;
use fieldchat::types::{ChatMessage, FieldNotice};
use fieldchat::{CancelHandle, ChatWidget, MemoryDocument, TurnOutcome, WidgetConfig};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;

const OFFLINE_REPLY: &str = "I'm running offline and can't reach the chat endpoint.";

/// Prints streamed deltas as they arrive, then the final text if it differs.
#[derive(Default)]
struct TerminalRenderer {
    open: Option<usize>,
    streamed: String,
}

impl ChatRenderer for TerminalRenderer {
    fn render_message(&mut self, index: usize, message: &ChatMessage) {
        if self.open != Some(index) {
            self.open = Some(index);
            self.streamed.clear();
            print!("assistant> ");
        }
        if let Some(piece) = message.content.get(self.streamed.len()..) {
            print!("{piece}");
            self.streamed.push_str(piece);
        }
        let _ = std::io::stdout().flush();
    }

    fn render_all(&mut self, state: &ConversationState) {
        if state.is_loading {
            return;
        }
        if let Some(index) = self.open.take() {
            println!();
            if let Some(msg) = state.messages.get(index)
                && msg.content != self.streamed
            {
                println!("assistant> {}", msg.content);
            }
            self.streamed.clear();
        }
        if let Some(err) = &state.error {
            eprintln!("[error] {err}");
        }
    }

    fn notify_fields(&mut self, notice: &FieldNotice) {
        println!("[fields] {}", notice.summary());
    }
}

fn load_dotenv() {
    if let Err(err) = dotenvy::dotenv() {
        tracing::debug!(%err, "no .env file loaded");
    }
}

/// Ctrl-C cancels the reply in flight; at the prompt it asks the loop to exit.
fn on_interrupt(cancel: &CancelHandle, quit: &Notify) {
    if !cancel.cancel() {
        quit.notify_one();
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    load_dotenv();

    let config = WidgetConfig::from_env();
    let form_path = PathBuf::from(
        std::env::var("FIELDCHAT_FORM").unwrap_or_else(|_| "form.json".to_string()),
    );
    let document = if form_path.exists() {
        MemoryDocument::load(&form_path)
            .with_context(|| format!("failed to load form {}", form_path.display()))?
    } else {
        tracing::warn!(path = %form_path.display(), "form file not found, starting with no fields");
        MemoryDocument::default()
    };

    let offline = std::env::var("FIELDCHAT_OFFLINE")
        .map(|v| is_truthy(&v))
        .unwrap_or(false);
    let backend: Arc<dyn ChatBackend> = if offline {
        Arc::new(ScriptedBackend::from_deltas(&[OFFLINE_REPLY]))
    } else {
        Arc::new(HttpBackend::new(&config)?)
    };

    let conversation = Conversation::load_with(
        FileStore::in_data_dir(),
        &config.storage_key,
        config.history_ttl,
        system_clock(),
    );
    let mut widget = ChatWidget::new(document, conversation, backend)
        .with_config(&config)
        .with_renderer(TerminalRenderer::default());

    for msg in &widget.state().messages {
        println!("{:?}> {}", msg.role, msg.content);
    }
    println!("Commands: /fields, /clear, /quit. Ctrl-C cancels a reply, or exits at the prompt.");

    let quit = Arc::new(Notify::new());
    let watcher = {
        let cancel = widget.cancel_handle();
        let quit = quit.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt(&cancel, &quit);
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            // A pending stdin read would hold runtime shutdown open.
            _ = quit.notified() => std::process::exit(0),
        };
        let Some(line) = line else { break };
        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/fields" => {
                for field in widget.fields().list_fields() {
                    println!("  {} ({}) = {:?}", field.id, field.kind, field.value);
                }
            }
            "/clear" => {
                if widget.is_clear_pending() {
                    if widget.confirm_clear() {
                        println!("Conversation cleared.");
                    }
                } else {
                    widget.request_clear();
                    println!("Type /clear again to confirm.");
                }
            }
            text => {
                let outcome = widget.send(text).await;

                match outcome {
                    TurnOutcome::Completed { writes } if !writes.is_empty() => {
                        if let Err(err) = widget.fields().document().save(&form_path) {
                            tracing::warn!(%err, "failed to save form");
                        }
                    }
                    TurnOutcome::Cancelled => println!("(cancelled)"),
                    TurnOutcome::Rejected => println!("(busy)"),
                    _ => {}
                }
                widget.dismiss_error();
            }
        }
    }

    watcher.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interrupt_at_prompt_requests_exit() {
        let quit = Notify::new();
        on_interrupt(&CancelHandle::default(), &quit);
        tokio::time::timeout(std::time::Duration::from_millis(50), quit.notified())
            .await
            .expect("exit was not requested");
    }

    #[test]
    fn truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("Yes"));
        assert!(!is_truthy("off"));
    }
}
