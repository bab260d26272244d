//! Field access for the hosting document.
//!
//! The host document is injected as a [`HostDocument`]; every element it
//! exposes is a [`FieldElement`] tagged with an explicit [`FieldKind`].
//! [`MemoryDocument`] is the in-process implementation used by the terminal
//! front-end and by tests.

use crate::types::FieldDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Maximum number of characters of a field value quoted in the system context.
const CONTEXT_VALUE_LIMIT: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    TextArea,
    Select,
    Email,
    Number,
    Url,
    Search,
    Tel,
    Date,
    Checkbox,
    Radio,
    Password,
    Hidden,
    Other(String),
}

impl FieldKind {
    /// Resolve the kind from an element tag and its optional `type` attribute.
    pub fn parse(tag: &str, type_attr: Option<&str>) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "textarea" => return Self::TextArea,
            "select" => return Self::Select,
            _ => {}
        }

        let raw = type_attr.map(str::trim).unwrap_or("").to_ascii_lowercase();
        match raw.as_str() {
            "" | "text" => Self::Text,
            "email" => Self::Email,
            "number" => Self::Number,
            "url" => Self::Url,
            "search" => Self::Search,
            "tel" => Self::Tel,
            "date" => Self::Date,
            "checkbox" => Self::Checkbox,
            "radio" => Self::Radio,
            "password" => Self::Password,
            "hidden" => Self::Hidden,
            _ => Self::Other(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::TextArea => "textarea",
            Self::Select => "select",
            Self::Email => "email",
            Self::Number => "number",
            Self::Url => "url",
            Self::Search => "search",
            Self::Tel => "tel",
            Self::Date => "date",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Password => "password",
            Self::Hidden => "hidden",
            Self::Other(name) => name.as_str(),
        }
    }

    /// Password and hidden fields are never listed, read, or written.
    pub fn is_sensitive(&self) -> bool {
        matches!(self, Self::Password | Self::Hidden)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification raised on the host document after a programmatic write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldEvent {
    Input,
    Change,
}

/// Capability exposed by one input-like element.
pub trait FieldElement {
    /// Element id; empty when the element has none.
    fn id(&self) -> &str;
    /// Element name attribute; empty when the element has none.
    fn name(&self) -> &str;
    fn kind(&self) -> FieldKind;
    fn value(&self) -> String;
    fn set_value(&mut self, value: &str);
}

/// The hosting document, as seen by the widget.
pub trait HostDocument {
    /// Every input-like element, in document order.
    fn fields(&self) -> Vec<&dyn FieldElement>;

    /// Mutable access to the element at `index` in [`HostDocument::fields`] order.
    fn field_mut(&mut self, index: usize) -> Option<&mut dyn FieldElement>;

    /// Deliver a change notification so host-side observers see the write.
    fn dispatch(&mut self, index: usize, event: FieldEvent);
}

/// Reads and writes named fields on an injected host document.
pub struct FieldAccessor<D> {
    document: D,
}

impl<D: HostDocument> FieldAccessor<D> {
    pub fn new(document: D) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }

    /// Snapshot every visible, addressable field.
    pub fn list_fields(&self) -> Vec<FieldDescriptor> {
        self.document
            .fields()
            .into_iter()
            .filter(|el| !el.kind().is_sensitive())
            .filter(|el| !el.id().is_empty() || !el.name().is_empty())
            .map(|el| {
                let id = if el.id().is_empty() {
                    el.name().to_string()
                } else {
                    el.id().to_string()
                };
                FieldDescriptor {
                    id,
                    name: el.name().to_string(),
                    kind: el.kind().to_string(),
                    value: el.value(),
                }
            })
            .collect()
    }

    /// Current value of a field, or `None` when no such field exists.
    pub fn read(&self, field_id: &str) -> Option<String> {
        let index = self.locate(field_id)?;
        self.document.fields().get(index).map(|el| el.value())
    }

    /// Set a field's value and notify the host. Returns whether a target was found.
    pub fn write(&mut self, field_id: &str, content: &str) -> bool {
        let Some(index) = self.locate(field_id) else {
            tracing::debug!(field = field_id, "write target not found");
            return false;
        };
        let Some(element) = self.document.field_mut(index) else {
            return false;
        };
        element.set_value(content);
        self.document.dispatch(index, FieldEvent::Input);
        self.document.dispatch(index, FieldEvent::Change);
        true
    }

    /// Id lookup first, then name. Sensitive kinds are never matched.
    fn locate(&self, field_id: &str) -> Option<usize> {
        if field_id.is_empty() {
            return None;
        }
        let fields = self.document.fields();
        let by_id = fields.iter().position(|el| el.id() == field_id);
        let index = by_id.or_else(|| fields.iter().position(|el| el.name() == field_id))?;
        if fields[index].kind().is_sensitive() {
            tracing::debug!(field = field_id, "refusing access to sensitive field");
            return None;
        }
        Some(index)
    }
}

/// Render the field listing for the system context.
pub fn describe_fields(fields: &[FieldDescriptor]) -> String {
    if fields.is_empty() {
        return "No form fields are available on this page.".to_string();
    }

    let mut out = String::from("Form fields on this page:\n");
    for field in fields {
        let mut value: String = field.value.chars().take(CONTEXT_VALUE_LIMIT).collect();
        if field.value.chars().count() > CONTEXT_VALUE_LIMIT {
            value.push_str("...");
        }
        if !field.name.is_empty() && field.name != field.id {
            out.push_str(&format!(
                "- {} (name: {}, type: {}): \"{}\"\n",
                field.id, field.name, field.kind, value
            ));
        } else {
            out.push_str(&format!("- {} (type: {}): \"{}\"\n", field.id, field.kind, value));
        }
    }
    out
}

// ============================================
// In-memory host document
// ============================================

/// One element of a [`MemoryDocument`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
pub enum MemoryElement {
    Input {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(rename = "type", default)]
        input_type: Option<String>,
        #[serde(default)]
        value: String,
    },
    Textarea {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        value: String,
    },
    Select {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        options: Vec<String>,
        #[serde(default)]
        selected: Option<usize>,
    },
}

impl MemoryElement {
    pub fn input(id: &str, input_type: &str, value: &str) -> Self {
        Self::Input {
            id: id.to_string(),
            name: String::new(),
            input_type: Some(input_type.to_string()),
            value: value.to_string(),
        }
    }

    pub fn named_input(name: &str, input_type: &str, value: &str) -> Self {
        Self::Input {
            id: String::new(),
            name: name.to_string(),
            input_type: Some(input_type.to_string()),
            value: value.to_string(),
        }
    }

    pub fn textarea(id: &str, value: &str) -> Self {
        Self::Textarea {
            id: id.to_string(),
            name: String::new(),
            value: value.to_string(),
        }
    }

    pub fn select(id: &str, options: &[&str], selected: Option<usize>) -> Self {
        Self::Select {
            id: id.to_string(),
            name: String::new(),
            options: options.iter().map(|o| o.to_string()).collect(),
            selected,
        }
    }
}

impl FieldElement for MemoryElement {
    fn id(&self) -> &str {
        match self {
            Self::Input { id, .. } | Self::Textarea { id, .. } | Self::Select { id, .. } => id,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Input { name, .. } | Self::Textarea { name, .. } | Self::Select { name, .. } => {
                name
            }
        }
    }

    fn kind(&self) -> FieldKind {
        match self {
            Self::Input { input_type, .. } => FieldKind::parse("input", input_type.as_deref()),
            Self::Textarea { .. } => FieldKind::TextArea,
            Self::Select { .. } => FieldKind::Select,
        }
    }

    fn value(&self) -> String {
        match self {
            Self::Input { value, .. } | Self::Textarea { value, .. } => value.clone(),
            Self::Select {
                options, selected, ..
            } => selected
                .and_then(|idx| options.get(idx))
                .cloned()
                .unwrap_or_default(),
        }
    }

    fn set_value(&mut self, new_value: &str) {
        match self {
            Self::Input { value, .. } | Self::Textarea { value, .. } => {
                *value = new_value.to_string();
            }
            // Like a DOM select: an unknown option clears the selection.
            Self::Select {
                options, selected, ..
            } => {
                *selected = options.iter().position(|o| o == new_value);
            }
        }
    }
}

/// A document held entirely in memory, optionally backed by a JSON file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryDocument {
    elements: Vec<MemoryElement>,
    #[serde(skip)]
    events: Vec<(usize, FieldEvent)>,
}

impl MemoryDocument {
    pub fn new(elements: Vec<MemoryElement>) -> Self {
        Self {
            elements,
            events: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&raw)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn elements(&self) -> &[MemoryElement] {
        &self.elements
    }

    /// Events dispatched so far, as `(element index, event)`.
    pub fn events(&self) -> &[(usize, FieldEvent)] {
        &self.events
    }
}

impl HostDocument for MemoryDocument {
    fn fields(&self) -> Vec<&dyn FieldElement> {
        self.elements
            .iter()
            .map(|el| el as &dyn FieldElement)
            .collect()
    }

    fn field_mut(&mut self, index: usize) -> Option<&mut dyn FieldElement> {
        self.elements
            .get_mut(index)
            .map(|el| el as &mut dyn FieldElement)
    }

    fn dispatch(&mut self, index: usize, event: FieldEvent) {
        self.events.push((index, event));
    }
}
