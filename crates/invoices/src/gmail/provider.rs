//! Mail provider abstraction
//!
//! The search and archive pipelines only talk to this trait, so they can be
//! driven by the Gmail REST client in production and by fakes in tests.

use super::api::GmailMessage;
use crate::models::MessageId;

/// Failure talking to the mail provider
///
/// The kind is decided once, where the raw transport error is translated,
/// so callers branch on the variant instead of inspecting message text.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The access token expired or was revoked; the user must sign in again
    #[error("Gmail access token expired or revoked")]
    TokenExpired,
    /// The token is valid but lacks permission for the request
    #[error("Gmail request not authorized: {0}")]
    Unauthorized(String),
    /// Non-success HTTP status other than auth failures
    #[error("Gmail API returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    /// Connection, TLS or I/O failure before a response was read
    #[error("Failed to reach Gmail: {0}")]
    Transport(String),
    /// Response arrived but could not be parsed
    #[error("Failed to decode Gmail response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_token_expired(&self) -> bool {
        matches!(self, ProviderError::TokenExpired)
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// How much of a message to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat<'a> {
    /// Headers, snippet and the complete part tree
    Full,
    /// Only the named headers
    Metadata(&'a [&'a str]),
}

/// Authenticated access to one user's mailbox
pub trait MailProvider {
    /// List message IDs matching a Gmail query, newest first
    fn list_message_ids(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<MessageId>, ProviderError>;

    /// Fetch one message
    fn get_message(
        &self,
        id: &MessageId,
        format: MessageFormat<'_>,
    ) -> Result<GmailMessage, ProviderError>;

    /// Fetch an attachment's content as base64url text
    fn get_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &str,
    ) -> Result<String, ProviderError>;

    /// Email address of the mailbox owner
    fn profile_email(&self) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Transport("reset".into()).is_transient());
        assert!(
            ProviderError::Http {
                status: 503,
                message: "backend".into()
            }
            .is_transient()
        );
        assert!(
            ProviderError::Http {
                status: 429,
                message: "rate".into()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::Http {
                status: 404,
                message: "gone".into()
            }
            .is_transient()
        );
        assert!(!ProviderError::TokenExpired.is_transient());
        assert!(ProviderError::TokenExpired.is_token_expired());
    }
}
