//! In-memory mail provider
//!
//! Serves canned messages and attachments. Used for testing the search and
//! archive pipelines without network access.

use base64::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::api::GmailMessage;
use super::{MailProvider, MessageFormat, ProviderError};
use crate::models::MessageId;

/// Mailbox contents held in memory
#[derive(Default)]
pub struct InMemoryProvider {
    /// Messages in listing order
    listed: Vec<MessageId>,
    messages: HashMap<MessageId, GmailMessage>,
    failing_messages: HashSet<MessageId>,
    /// (message id, attachment id) -> base64url data
    attachments: HashMap<(String, String), String>,
    failing_attachments: HashSet<(String, String)>,
    token_expired: bool,
    email: String,
    attachment_fetches: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            email: "me@example.com".to_string(),
            ..Default::default()
        }
    }

    /// Add a message; it is listed for every query, in insertion order
    pub fn with_message(mut self, message: GmailMessage) -> Self {
        let id = MessageId::new(&message.id);
        self.listed.push(id.clone());
        self.messages.insert(id, message);
        self
    }

    /// List a message ID whose fetch fails
    pub fn with_failing_message(mut self, id: &str) -> Self {
        let id = MessageId::new(id);
        self.listed.push(id.clone());
        self.failing_messages.insert(id);
        self
    }

    /// Store attachment content (encoded the way Gmail sends it)
    pub fn with_attachment(self, message_id: &str, attachment_id: &str, content: &[u8]) -> Self {
        let data = BASE64_URL_SAFE.encode(content);
        self.with_raw_attachment(message_id, attachment_id, &data)
    }

    /// Store attachment data verbatim, without encoding
    pub fn with_raw_attachment(mut self, message_id: &str, attachment_id: &str, data: &str) -> Self {
        self.attachments.insert(
            (message_id.to_string(), attachment_id.to_string()),
            data.to_string(),
        );
        self
    }

    /// Make downloads of one attachment fail with a transport error
    pub fn with_failing_attachment(mut self, message_id: &str, attachment_id: &str) -> Self {
        self.failing_attachments
            .insert((message_id.to_string(), attachment_id.to_string()));
        self
    }

    /// Reject every call as if the access token had expired
    pub fn with_expired_token(mut self) -> Self {
        self.token_expired = true;
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = email.to_string();
        self
    }

    /// Number of attachment downloads served or attempted
    pub fn attachment_fetches(&self) -> usize {
        self.attachment_fetches.load(Ordering::SeqCst)
    }

    /// Queries passed to `list_message_ids`, oldest first
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn check_token(&self) -> Result<(), ProviderError> {
        if self.token_expired {
            Err(ProviderError::TokenExpired)
        } else {
            Ok(())
        }
    }
}

impl MailProvider for InMemoryProvider {
    fn list_message_ids(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<MessageId>, ProviderError> {
        self.check_token()?;
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
        Ok(self.listed.iter().take(max_results).cloned().collect())
    }

    fn get_message(
        &self,
        id: &MessageId,
        format: MessageFormat<'_>,
    ) -> Result<GmailMessage, ProviderError> {
        self.check_token()?;
        if self.failing_messages.contains(id) {
            return Err(ProviderError::Transport(format!("connection reset fetching {}", id)));
        }

        let mut message = self.messages.get(id).cloned().ok_or_else(|| ProviderError::Http {
            status: 404,
            message: format!("Message {} not found", id),
        })?;

        if let MessageFormat::Metadata(names) = format
            && let Some(payload) = message.payload.as_mut()
        {
            payload.parts = None;
            if let Some(headers) = payload.headers.as_mut() {
                headers.retain(|h| names.iter().any(|n| n.eq_ignore_ascii_case(&h.name)));
            }
        }

        Ok(message)
    }

    fn get_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &str,
    ) -> Result<String, ProviderError> {
        self.check_token()?;
        self.attachment_fetches.fetch_add(1, Ordering::SeqCst);

        let key = (message_id.as_str().to_string(), attachment_id.to_string());
        if self.failing_attachments.contains(&key) {
            return Err(ProviderError::Transport(format!(
                "connection reset downloading {}",
                attachment_id
            )));
        }

        self.attachments
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::Http {
                status: 404,
                message: format!("Attachment {} not found", attachment_id),
            })
    }

    fn profile_email(&self) -> Result<String, ProviderError> {
        self.check_token()?;
        Ok(self.email.clone())
    }
}
