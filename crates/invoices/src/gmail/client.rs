//! Gmail API HTTP client
//!
//! Implements [`MailProvider`] over the Gmail REST API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use serde::de::DeserializeOwned;
use std::time::Duration;

use super::api::{AttachmentResponse, GmailMessage, ListMessagesResponse, ProfileResponse};
use super::{AccessToken, MailProvider, MessageFormat, ProviderError};
use crate::models::MessageId;

/// Gmail API client bound to one user's access token
pub struct GmailClient {
    agent: ureq::Agent,
    token: AccessToken,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Attempts per request when failures are transient
    const MAX_ATTEMPTS: u32 = 3;

    /// Upper bound on a single response body (attachments arrive inline as base64)
    const MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;

    /// Create a new Gmail client for the given access token
    pub fn new(token: AccessToken) -> Self {
        // Status codes are inspected by hand so auth failures can be classified
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(60)))
            .build()
            .into();

        Self { agent, token }
    }

    /// URL for `messages.list` with a search query
    fn list_url(query: &str, max_results: usize) -> String {
        format!(
            "{}/users/me/messages?maxResults={}&q={}",
            Self::BASE_URL,
            max_results.clamp(1, 500),
            urlencoding::encode(query)
        )
    }

    /// URL for `messages.get` in the requested format
    fn message_url(id: &MessageId, format: MessageFormat<'_>) -> String {
        let mut url = format!(
            "{}/users/me/messages/{}",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );

        match format {
            MessageFormat::Full => url.push_str("?format=full"),
            MessageFormat::Metadata(headers) => {
                url.push_str("?format=metadata");
                for header in headers {
                    url.push_str("&metadataHeaders=");
                    url.push_str(&urlencoding::encode(header));
                }
            }
        }

        url
    }

    /// URL for `messages.attachments.get`
    fn attachment_url(message_id: &MessageId, attachment_id: &str) -> String {
        format!(
            "{}/users/me/messages/{}/attachments/{}",
            Self::BASE_URL,
            urlencoding::encode(message_id.as_str()),
            urlencoding::encode(attachment_id)
        )
    }

    /// GET a URL and decode the JSON response, retrying transient failures
    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        let mut delay = Duration::from_millis(100);
        let mut attempt = 1;

        loop {
            match self.get_json_once(url) {
                Err(e) if e.is_transient() && attempt < Self::MAX_ATTEMPTS => {
                    log::debug!("[GMAIL] attempt {} failed ({}), retrying", attempt, e);
                    std::thread::sleep(delay + Duration::from_millis(rand_jitter()));
                    delay *= 2;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn get_json_once<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        let mut response = self
            .agent
            .get(url)
            .header("Authorization", &format!("Bearer {}", self.token.secret()))
            .call()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .with_config()
            .limit(Self::MAX_RESPONSE_BYTES)
            .read_to_string()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(classify_failure(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

impl MailProvider for GmailClient {
    fn list_message_ids(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<MessageId>, ProviderError> {
        let list: ListMessagesResponse = self.get_json(&Self::list_url(query, max_results))?;

        Ok(list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageId::new(m.id))
            .collect())
    }

    fn get_message(
        &self,
        id: &MessageId,
        format: MessageFormat<'_>,
    ) -> Result<GmailMessage, ProviderError> {
        self.get_json(&Self::message_url(id, format))
    }

    fn get_attachment(
        &self,
        message_id: &MessageId,
        attachment_id: &str,
    ) -> Result<String, ProviderError> {
        let attachment: AttachmentResponse =
            self.get_json(&Self::attachment_url(message_id, attachment_id))?;
        Ok(attachment.data)
    }

    fn profile_email(&self) -> Result<String, ProviderError> {
        let url = format!("{}/users/me/profile", Self::BASE_URL);
        let profile: ProfileResponse = self.get_json(&url)?;
        Ok(profile.email_address)
    }
}

/// Markers Google puts in bodies of revoked or expired credential failures
const EXPIRED_MARKERS: [&str; 3] = ["invalid_grant", "Token has been expired", "UNAUTHENTICATED"];

/// Translate a non-success response into a tagged [`ProviderError`]
pub(crate) fn classify_failure(status: u16, body: &str) -> ProviderError {
    if status == 401 || EXPIRED_MARKERS.iter().any(|m| body.contains(m)) {
        return ProviderError::TokenExpired;
    }

    let message = error_message(body);
    if status == 403 {
        ProviderError::Unauthorized(message)
    } else {
        ProviderError::Http { status, message }
    }
}

/// Pull `error.message` out of a Google error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error_description"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_url_encodes_query() {
        let url = GmailClient::list_url("(factura OR pago) has:attachment", 25);
        assert!(url.ends_with(
            "/users/me/messages?maxResults=25&q=%28factura%20OR%20pago%29%20has%3Aattachment"
        ));
    }

    #[test]
    fn test_list_url_clamps_max_results() {
        assert!(GmailClient::list_url("x", 10_000).contains("maxResults=500"));
        assert!(GmailClient::list_url("x", 0).contains("maxResults=1"));
    }

    #[test]
    fn test_message_url_formats() {
        let id = MessageId::new("abc");
        assert!(GmailClient::message_url(&id, MessageFormat::Full).ends_with("/messages/abc?format=full"));

        let url = GmailClient::message_url(&id, MessageFormat::Metadata(&["Subject", "From"]));
        assert!(url.ends_with(
            "/messages/abc?format=metadata&metadataHeaders=Subject&metadataHeaders=From"
        ));
    }

    #[test]
    fn test_attachment_url() {
        let url = GmailClient::attachment_url(&MessageId::new("m1"), "ANGjdJ_x");
        assert!(url.ends_with("/users/me/messages/m1/attachments/ANGjdJ_x"));
    }

    #[test]
    fn test_classify_401_as_expired() {
        let body = r#"{"error":{"code":401,"message":"Request had invalid authentication credentials.","status":"UNAUTHENTICATED"}}"#;
        assert!(classify_failure(401, body).is_token_expired());
    }

    #[test]
    fn test_classify_invalid_grant_as_expired() {
        let body = r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#;
        assert!(classify_failure(400, body).is_token_expired());
    }

    #[test]
    fn test_classify_forbidden_and_other() {
        let body = r#"{"error":{"code":403,"message":"Insufficient Permission"}}"#;
        match classify_failure(403, body) {
            ProviderError::Unauthorized(msg) => assert_eq!(msg, "Insufficient Permission"),
            other => panic!("unexpected: {other:?}"),
        }

        match classify_failure(404, "Not Found") {
            ProviderError::Http { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not Found");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
