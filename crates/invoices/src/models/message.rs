//! Message models: search result summaries and archive selections

use super::AttachmentDescriptor;
use serde::{Deserialize, Serialize};

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A search hit: one message carrying at least one eligible attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Gmail message ID
    pub id: MessageId,
    /// Subject line ("no subject" when missing)
    pub subject: String,
    /// Raw From header ("unknown" when missing)
    pub from: String,
    /// Date header truncated for display
    pub date: String,
    /// Gmail snippet, truncated with a trailing ellipsis
    pub snippet: String,
    /// Eligible attachments in part-tree order, never empty
    pub attachments: Vec<AttachmentDescriptor>,
}

/// One message's attachments chosen for the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedMessage {
    pub id: MessageId,
    pub attachments: Vec<AttachmentDescriptor>,
}

impl SelectedMessage {
    pub fn new(id: MessageId, attachments: Vec<AttachmentDescriptor>) -> Self {
        Self { id, attachments }
    }
}

impl From<&MessageSummary> for SelectedMessage {
    /// Select every attachment of a summary
    fn from(summary: &MessageSummary) -> Self {
        Self {
            id: summary.id.clone(),
            attachments: summary.attachments.clone(),
        }
    }
}
