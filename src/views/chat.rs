use crate::conversation::ConversationState;
use crate::render::markdown_to_html;
use crate::types::{ChatMessage, Role};
use dioxus::events::Key;
use dioxus::prelude::*;

fn is_pending_assistant(msg: &ChatMessage, is_last: bool, is_loading: bool) -> bool {
    matches!(msg.role, Role::Assistant) && is_last && is_loading && msg.content.is_empty()
}

/// Chat panel bound to a widget's state. Sending and both clear steps are
/// routed to the caller, which owns the pending-clear flag.
#[component]
pub fn ChatPanel(
    state: ConversationState,
    notice: Option<String>,
    clear_pending: bool,
    on_send: EventHandler<String>,
    on_request_clear: EventHandler<()>,
    on_cancel_clear: EventHandler<()>,
    on_confirm_clear: EventHandler<()>,
    on_dismiss_error: EventHandler<()>,
) -> Element {
    let mut input = use_signal(String::new);
    let is_loading = state.is_loading;

    let mut send_message = move |text: String| {
        if text.trim().is_empty() || is_loading {
            return;
        }
        input.set(String::new());
        on_send.call(text);
    };

    let last_index = state.messages.len().saturating_sub(1);

    rsx! {
        div { class: "main-container",
            if let Some(err) = state.error.clone() {
                div { class: "chat-error", role: "alert",
                    span { "{err}" }
                    button { class: "action-btn", onclick: move |_| on_dismiss_error.call(()), "Dismiss" }
                }
            }
            if let Some(text) = notice {
                div { class: "field-notice", "{text}" }
            }
            div { class: "chat-wrap",
                div { id: "chat-list", class: "chat-list",
                    for (i, msg) in state.messages.iter().enumerate().filter(|(_, m)| m.role != Role::System) {
                        div { key: "{i}", class: format_args!("message-row {}", match msg.role { Role::User => "user", _ => "assistant" }),
                            if is_pending_assistant(msg, i == last_index, is_loading) {
                                div { class: "shimmer-line",
                                    span { class: "shimmer-text", "Processing…" }
                                }
                            } else if matches!(msg.role, Role::Assistant) {
                                div { class: "bubble assistant",
                                    div { class: "md", dangerous_inner_html: "{markdown_to_html(&msg.content)}" }
                                }
                            } else {
                                div { class: "bubble user", "{msg.content}" }
                            }
                        }
                    }
                }
            }

            form { class: "composer no-divider",
                div { class: "composer-inner",
                    div { class: "hstack", style: "gap: 0.5rem; width: 100%; align-items: flex-end;",
                        textarea {
                            rows: "1", placeholder: "Ask about this page…",
                            value: "{input}", oninput: move |ev| input.set(ev.value()),
                            onkeydown: move |ev| {
                                if ev.key() == Key::Enter && !ev.modifiers().shift() {
                                    ev.prevent_default();
                                    send_message(input());
                                }
                            },
                            disabled: is_loading,
                        }
                        button {
                            class: "btn btn-primary", r#type: "button",
                            disabled: is_loading || input().trim().is_empty(),
                            onclick: move |_| send_message(input()),
                            "Send"
                        }
                        if clear_pending {
                            button {
                                class: "btn btn-danger", r#type: "button",
                                onclick: move |_| on_confirm_clear.call(()),
                                "Confirm clear"
                            }
                            button {
                                class: "btn", r#type: "button",
                                onclick: move |_| on_cancel_clear.call(()),
                                "Cancel"
                            }
                        } else {
                            button {
                                class: "btn", r#type: "button",
                                disabled: is_loading,
                                onclick: move |_| on_request_clear.call(()),
                                "Clear"
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[component]
    fn PendingClearHost() -> Element {
        let state = ConversationState {
            messages: vec![ChatMessage::user("hi"), ChatMessage::assistant("**hello**")],
            ..Default::default()
        };
        rsx! {
            ChatPanel {
                state,
                notice: Some("Updated: title".to_string()),
                clear_pending: true,
                on_send: move |_| {},
                on_request_clear: move |_| {},
                on_cancel_clear: move |_| {},
                on_confirm_clear: move |_| {},
                on_dismiss_error: move |_| {},
            }
        }
    }

    #[test]
    fn panel_mounts_with_pending_clear() {
        let mut dom = VirtualDom::new(PendingClearHost);
        dom.rebuild_in_place();
    }

    #[test]
    fn pending_placeholder_is_last_empty_assistant_while_loading() {
        let empty = ChatMessage::assistant("");
        assert!(is_pending_assistant(&empty, true, true));
        assert!(!is_pending_assistant(&empty, false, true));
        assert!(!is_pending_assistant(&empty, true, false));
        assert!(!is_pending_assistant(&ChatMessage::user(""), true, true));
    }
}
