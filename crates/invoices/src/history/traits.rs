//! History store trait and row type

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One downloaded attachment, as recorded for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub user_email: String,
    /// Gmail message the attachment came from
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    /// Original attachment filename
    pub filename: String,
    pub generation_code: Option<String>,
    pub control_number: Option<String>,
    pub issuer_name: Option<String>,
    pub receiver_name: Option<String>,
    pub total_amount: Option<f64>,
    pub downloaded_at: DateTime<Utc>,
}

/// Trait for download history persistence
///
/// Recording is best-effort from the application's point of view; callers
/// log failures instead of failing the download.
pub trait HistoryStore: Send + Sync {
    /// Append a batch of rows
    fn save_history(&self, rows: &[HistoryRow]) -> Result<()>;

    /// All rows for a user, most recent first where the backend records the time
    fn list_history(&self, user_email: &str) -> Result<Vec<HistoryRow>>;

    /// Gmail message IDs the user has already downloaded from
    fn downloaded_message_ids(&self, user_email: &str) -> Result<HashSet<String>> {
        Ok(self
            .list_history(user_email)?
            .into_iter()
            .map(|row| row.message_id)
            .filter(|id| !id.is_empty())
            .collect())
    }
}
