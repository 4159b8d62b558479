use chrono::{DateTime, Utc};
use finsight_protocol::ArtifactKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_TITLE_CHARS: usize = 80;

/// One version of a server-side document.
///
/// `content` is opaque to the store: prose or code for text-like kinds, a
/// JSON-encoded `FinancialSnapshot` for financial documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub title: String,
    pub kind: ArtifactKind,
    pub user_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        id: Uuid,
        chat_id: Uuid,
        title: impl Into<String>,
        kind: ArtifactKind,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            chat_id,
            title: title.into(),
            kind,
            user_id: user_id.into(),
            content: content.into(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The same document with new content, stamped now. Used to write the
    /// next version.
    pub fn revised(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            created_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// A conversation owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(id: Uuid, user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            title: title.into(),
            created_at: Utc::now(),
        }
    }
}

/// Title for a new chat: the first line of the opening message, capped at
/// 80 characters.
pub fn chat_title_from_message(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or_default().trim();
    let title: String = first_line.chars().take(MAX_TITLE_CHARS).collect();
    if title.is_empty() {
        "New chat".to_string()
    } else {
        title
    }
}
