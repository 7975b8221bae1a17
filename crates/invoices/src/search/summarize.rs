//! Message listing and summarization for invoice searches

use log::{debug, info, warn};

use super::{SearchQuery, find_attachments};
use crate::gmail::api::{GmailMessage, MessagePayload};
use crate::gmail::{MailProvider, MessageFormat, ProviderError};
use crate::models::{MessageId, MessageSummary};

/// Maximum number of messages fetched per search
pub const MAX_SEARCH_RESULTS: usize = 25;

/// Snippet length (in characters) before the ellipsis
pub const SNIPPET_CHARS: usize = 100;

/// Date header length (in characters) kept for display
pub const DATE_CHARS: usize = 16;

const NO_SUBJECT: &str = "no subject";
const UNKNOWN: &str = "unknown";

/// List IDs of messages matching a Gmail query, in provider order
pub fn list_message_ids(
    provider: &dyn MailProvider,
    query: &str,
    max_results: usize,
) -> Result<Vec<MessageId>, ProviderError> {
    let ids = provider.list_message_ids(query, max_results)?;
    debug!("[SEARCH] {} candidate messages for query: {}", ids.len(), query);
    Ok(ids)
}

/// Search the mailbox for invoice messages
///
/// Listing errors (including token expiry) fail the whole search. A message
/// that fails to load is logged and skipped; messages without eligible
/// attachments are dropped.
pub fn search_invoices(
    provider: &dyn MailProvider,
    query: &SearchQuery,
) -> Result<Vec<MessageSummary>, ProviderError> {
    let gmail_query = query.to_gmail_query();
    info!("[SEARCH] Searching Gmail with query: {}", gmail_query);

    let ids = list_message_ids(provider, &gmail_query, MAX_SEARCH_RESULTS)?;

    let mut summaries = Vec::with_capacity(ids.len());
    for id in &ids {
        match summarize_message(provider, id) {
            Ok(Some(summary)) => summaries.push(summary),
            Ok(None) => debug!("[SEARCH] Message {} has no eligible attachments", id),
            Err(e) => warn!("[SEARCH] Failed to process message {}: {}", id, e),
        }
    }

    info!(
        "[SEARCH] {} of {} messages carry invoice attachments",
        summaries.len(),
        ids.len()
    );
    Ok(summaries)
}

/// Fetch one message and summarize it
///
/// Returns `Ok(None)` when the message has no eligible attachments.
pub fn summarize_message(
    provider: &dyn MailProvider,
    id: &MessageId,
) -> Result<Option<MessageSummary>, ProviderError> {
    let message = provider.get_message(id, MessageFormat::Full)?;
    Ok(summarize(id, &message))
}

/// Build a summary from an already fetched message
pub fn summarize(id: &MessageId, message: &GmailMessage) -> Option<MessageSummary> {
    let payload = message.payload.as_ref();

    let attachments = payload
        .and_then(|p| p.parts.as_deref())
        .map(find_attachments)
        .unwrap_or_default();

    if attachments.is_empty() {
        return None;
    }

    let header = |name: &str| payload.and_then(|p| extract_header(p, name));

    Some(MessageSummary {
        id: id.clone(),
        subject: header("Subject").unwrap_or_else(|| NO_SUBJECT.to_string()),
        from: header("From").unwrap_or_else(|| UNKNOWN.to_string()),
        date: header("Date")
            .filter(|d| !d.is_empty())
            .map(|d| truncate_chars(&d, DATE_CHARS).to_string())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        snippet: format!(
            "{}...",
            truncate_chars(&decode_html_entities(&message.snippet), SNIPPET_CHARS)
        ),
        attachments,
    })
}

/// Extract a header value by name (first match wins)
pub(crate) fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Longest prefix of at most `max` characters
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Decode HTML entities in snippet text
fn decode_html_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::{Header, MessageBody, MessagePart};

    fn headers(pairs: &[(&str, &str)]) -> Vec<Header> {
        pairs
            .iter()
            .map(|(n, v)| Header {
                name: n.to_string(),
                value: v.to_string(),
            })
            .collect()
    }

    fn pdf_part(name: &str) -> MessagePart {
        MessagePart {
            filename: Some(name.to_string()),
            mime_type: Some("application/pdf".to_string()),
            body: Some(MessageBody {
                attachment_id: Some(format!("id-{}", name)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn message(pairs: &[(&str, &str)], snippet: &str, parts: Vec<MessagePart>) -> GmailMessage {
        GmailMessage {
            id: "m1".to_string(),
            snippet: snippet.to_string(),
            payload: Some(MessagePayload {
                headers: Some(headers(pairs)),
                parts: Some(parts),
            }),
        }
    }

    #[test]
    fn test_summary_fields() {
        let msg = message(
            &[
                ("Subject", "Factura 001"),
                ("From", "ACME <billing@acme.test>"),
                ("Date", "Mon, 15 Jan 2024 10:30:00 -0600"),
            ],
            "Adjuntamos su factura &amp; comprobante",
            vec![pdf_part("f.pdf")],
        );

        let summary = summarize(&MessageId::new("m1"), &msg).unwrap();
        assert_eq!(summary.subject, "Factura 001");
        assert_eq!(summary.from, "ACME <billing@acme.test>");
        assert_eq!(summary.date, "Mon, 15 Jan 2024");
        assert_eq!(summary.snippet, "Adjuntamos su factura & comprobante...");
        assert_eq!(summary.attachments.len(), 1);
    }

    #[test]
    fn test_header_defaults() {
        let msg = message(&[], "", vec![pdf_part("f.pdf")]);
        let summary = summarize(&MessageId::new("m1"), &msg).unwrap();
        assert_eq!(summary.subject, "no subject");
        assert_eq!(summary.from, "unknown");
        assert_eq!(summary.date, "unknown");
        assert_eq!(summary.snippet, "...");
    }

    #[test]
    fn test_first_header_wins_case_insensitive() {
        let msg = message(
            &[("SUBJECT", "first"), ("Subject", "second")],
            "",
            vec![pdf_part("f.pdf")],
        );
        let summary = summarize(&MessageId::new("m1"), &msg).unwrap();
        assert_eq!(summary.subject, "first");
    }

    #[test]
    fn test_snippet_truncated_on_char_boundary() {
        let long = "ñ".repeat(150);
        let msg = message(&[], &long, vec![pdf_part("f.pdf")]);
        let summary = summarize(&MessageId::new("m1"), &msg).unwrap();
        assert_eq!(summary.snippet.chars().count(), SNIPPET_CHARS + 3);
        assert!(summary.snippet.ends_with("ñ..."));
    }

    #[test]
    fn test_no_eligible_attachments_is_discarded() {
        let mut png = pdf_part("logo.png");
        png.mime_type = Some("image/png".to_string());
        let msg = message(&[("Subject", "Hola")], "hi", vec![png]);
        assert!(summarize(&MessageId::new("m1"), &msg).is_none());

        let no_payload = GmailMessage::default();
        assert!(summarize(&MessageId::new("m2"), &no_payload).is_none());
    }
}
