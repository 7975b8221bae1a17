//! Gmail API integration
//!
//! This module provides:
//! - OAuth2 authentication flow and token storage
//! - The [`MailProvider`] seam the search and archive pipelines depend on
//! - A Gmail REST implementation of it ([`GmailClient`])
//! - An in-memory implementation for tests ([`InMemoryProvider`])

mod auth;
mod client;
mod memory;
mod provider;

pub use auth::{AccessToken, GmailAuth};
pub use client::GmailClient;
pub use memory::InMemoryProvider;
pub use provider::{MailProvider, MessageFormat, ProviderError};

/// Gmail API response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
    }

    /// Reference to a message in a listing
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
    }

    /// Message from the Gmail API (full or metadata format)
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailMessage {
        pub id: String,
        #[serde(default)]
        pub snippet: String,
        pub payload: Option<MessagePayload>,
    }

    /// Top-level message payload containing headers and the part tree
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        pub headers: Option<Vec<Header>>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Clone, Deserialize, Serialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Part body: inline data or a handle to fetch it separately
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageBody {
        pub data: Option<String>,
        pub attachment_id: Option<String>,
    }

    /// Message part (for multipart messages)
    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub mime_type: Option<String>,
        pub filename: Option<String>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }

    /// Attachment content from `messages.attachments.get`
    #[derive(Debug, Deserialize)]
    pub struct AttachmentResponse {
        /// Base64url-encoded bytes
        pub data: String,
    }

    /// Mailbox profile of the authenticated user
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProfileResponse {
        pub email_address: String,
    }
}
