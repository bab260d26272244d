use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Snapshot of one host-page field. Recomputed on every listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Outcome of applying one `WRITE_FIELD` directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldWriteResult {
    pub field: String,
    pub content: String,
    pub success: bool,
}

/// Aggregated write outcome for a single turn, shown to the user once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldNotice {
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

impl FieldNotice {
    pub fn from_results(results: &[FieldWriteResult]) -> Self {
        let mut notice = Self::default();
        for result in results {
            if result.success {
                notice.updated.push(result.field.clone());
            } else {
                notice.failed.push(result.field.clone());
            }
        }
        notice
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.updated.is_empty() {
            parts.push(format!("Updated: {}", self.updated.join(", ")));
        }
        if !self.failed.is_empty() {
            parts.push(format!("Not found: {}", self.failed.join(", ")));
        }
        parts.join(" • ")
    }
}
