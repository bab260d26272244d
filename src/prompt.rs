use crate::fields::describe_fields;
use crate::types::{ChatMessage, FieldDescriptor};

const FIELD_ASSISTANT_PROMPT: &str = r#"You are a helpful assistant embedded in a web page. You can see and edit the page's form fields.

To change a field, write its new content between tags, using the field id exactly as listed:
[WRITE_FIELD:field_id]new content[/WRITE_FIELD]

You may write several fields in one reply. Do not nest tags. Everything outside the tags is shown to the user, so briefly say what you changed.
Never invent field ids. If a field the user asks about is not listed, say so."#;

/// Build the leading system message from the current field listing.
pub fn system_message(fields: &[FieldDescriptor]) -> ChatMessage {
    ChatMessage::system(format!(
        "{FIELD_ASSISTANT_PROMPT}\n\n{}",
        describe_fields(fields)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn system_message_embeds_fields() {
        let fields = vec![FieldDescriptor {
            id: "title".into(),
            name: "title".into(),
            kind: "text".into(),
            value: "Draft".into(),
        }];
        let msg = system_message(&fields);
        assert_eq!(msg.role, Role::System);
        assert!(msg.content.contains("[WRITE_FIELD:field_id]"));
        assert!(msg.content.contains("- title (type: text): \"Draft\""));
    }
}
