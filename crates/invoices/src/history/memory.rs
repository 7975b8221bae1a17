//! In-memory history store
//!
//! Used for testing and when no persistent backend is wanted.

use anyhow::{Result, anyhow};
use std::sync::RwLock;

use super::{HistoryRow, HistoryStore};

/// In-memory implementation of HistoryStore
#[derive(Default)]
pub struct InMemoryHistoryStore {
    rows: RwLock<Vec<HistoryRow>>,
}

impl InMemoryHistoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows across all users
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn save_history(&self, rows: &[HistoryRow]) -> Result<()> {
        let mut stored = self
            .rows
            .write()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        stored.extend_from_slice(rows);
        Ok(())
    }

    fn list_history(&self, user_email: &str) -> Result<Vec<HistoryRow>> {
        let stored = self
            .rows
            .read()
            .map_err(|_| anyhow!("history lock poisoned"))?;

        // Stable sort keeps later inserts first among equal timestamps
        let mut rows: Vec<HistoryRow> = stored
            .iter()
            .rev()
            .filter(|row| row.user_email == user_email)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.downloaded_at.cmp(&a.downloaded_at));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn row(user: &str, message_id: &str, age_minutes: i64) -> HistoryRow {
        HistoryRow {
            user_email: user.to_string(),
            message_id: message_id.to_string(),
            subject: "Factura".to_string(),
            sender: "billing@acme.test".to_string(),
            filename: "f.pdf".to_string(),
            generation_code: None,
            control_number: None,
            issuer_name: None,
            receiver_name: None,
            total_amount: None,
            downloaded_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn test_rows_are_scoped_per_user_and_newest_first() {
        let store = InMemoryHistoryStore::new();
        store
            .save_history(&[row("a@x.test", "m1", 10), row("b@x.test", "m2", 5)])
            .unwrap();
        store.save_history(&[row("a@x.test", "m3", 1)]).unwrap();

        let rows = store.list_history("a@x.test").unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.message_id.as_str()).collect();
        assert_eq!(ids, vec!["m3", "m1"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_downloaded_message_ids() {
        let store = InMemoryHistoryStore::new();
        store
            .save_history(&[row("a@x.test", "m1", 2), row("a@x.test", "m1", 1), row("a@x.test", "", 1)])
            .unwrap();

        let ids = store.downloaded_message_ids("a@x.test").unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains("m1"));
        assert!(store.downloaded_message_ids("nobody@x.test").unwrap().is_empty());
    }
}
