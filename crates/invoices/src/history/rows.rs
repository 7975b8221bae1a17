//! Building history rows for a finished download

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::HistoryRow;
use crate::models::{MessageSummary, SelectedMessage, TaxDocumentMetadata, is_eligible_filename};

/// One row per eligible attachment of each selection
///
/// Subject and sender come from the matching summary (when the caller still
/// has it). DTE fields come from the metadata recorded for the same message,
/// so the PDF next to a DTE JSON carries the same generation code.
pub fn history_rows(
    user_email: &str,
    summaries: &[MessageSummary],
    selections: &[SelectedMessage],
    metadata: &[TaxDocumentMetadata],
    downloaded_at: DateTime<Utc>,
) -> Vec<HistoryRow> {
    let summaries: HashMap<&str, &MessageSummary> =
        summaries.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut by_message: HashMap<&str, &TaxDocumentMetadata> = HashMap::new();
    for meta in metadata {
        by_message.entry(meta.message_id.as_str()).or_insert(meta);
    }

    selections
        .iter()
        .flat_map(|selection| {
            let id = selection.id.as_str();
            let summary = summaries.get(id);
            let meta = by_message.get(id);

            selection
                .attachments
                .iter()
                .filter(|att| is_eligible_filename(&att.filename))
                .map(move |att| HistoryRow {
                    user_email: user_email.to_string(),
                    message_id: id.to_string(),
                    subject: summary
                        .map(|s| s.subject.clone())
                        .unwrap_or_else(|| "no subject".to_string()),
                    sender: summary
                        .map(|s| s.from.clone())
                        .unwrap_or_else(|| "unknown".to_string()),
                    filename: att.filename.clone(),
                    generation_code: meta.and_then(|m| m.generation_code.clone()),
                    control_number: meta.and_then(|m| m.control_number.clone()),
                    issuer_name: meta.and_then(|m| m.issuer_name.clone()),
                    receiver_name: meta.and_then(|m| m.receiver_name.clone()),
                    total_amount: meta.and_then(|m| m.total_amount),
                    downloaded_at,
                })
        })
        .collect()
}
