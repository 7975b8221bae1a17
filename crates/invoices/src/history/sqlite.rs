//! SQLite-based download history

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use rusqlite_migration::{M, Migrations};

use super::{HistoryRow, HistoryStore};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE download_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_email TEXT NOT NULL,
                message_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                sender TEXT NOT NULL,
                filename TEXT NOT NULL,
                generation_code TEXT,
                control_number TEXT,
                issuer_name TEXT,
                receiver_name TEXT,
                total_amount REAL,
                downloaded_at TEXT NOT NULL
            );

            CREATE INDEX idx_download_history_user
                ON download_history(user_email, downloaded_at DESC);
            "#,
        ),
    ])
}

/// SQLite-backed history store
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    /// Open (or create) the history database at `db_path`
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        Self::with_connection(conn)
    }

    /// In-memory database, for tests
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("history database lock poisoned"))
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn save_history(&self, rows: &[HistoryRow]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO download_history
                 (user_email, message_id, subject, sender, filename, generation_code,
                  control_number, issuer_name, receiver_name, total_amount, downloaded_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;

            for row in rows {
                stmt.execute(params![
                    row.user_email,
                    row.message_id,
                    row.subject,
                    row.sender,
                    row.filename,
                    row.generation_code,
                    row.control_number,
                    row.issuer_name,
                    row.receiver_name,
                    row.total_amount,
                    row.downloaded_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit().context("Failed to commit history rows")?;
        log::debug!("[HISTORY] Recorded {} rows", rows.len());
        Ok(())
    }

    fn list_history(&self, user_email: &str) -> Result<Vec<HistoryRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_email, message_id, subject, sender, filename, generation_code,
                    control_number, issuer_name, receiver_name, total_amount, downloaded_at
             FROM download_history
             WHERE user_email = ?
             ORDER BY downloaded_at DESC, id DESC",
        )?;

        let rows = stmt
            .query_map([user_email], |row| {
                let downloaded_at: String = row.get(10)?;
                Ok(HistoryRow {
                    user_email: row.get(0)?,
                    message_id: row.get(1)?,
                    subject: row.get(2)?,
                    sender: row.get(3)?,
                    filename: row.get(4)?,
                    generation_code: row.get(5)?,
                    control_number: row.get(6)?,
                    issuer_name: row.get(7)?,
                    receiver_name: row.get(8)?,
                    total_amount: row.get(9)?,
                    downloaded_at: parse_timestamp(&downloaded_at),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            log::warn!("[HISTORY] Unparseable timestamp {:?}", value);
            DateTime::<Utc>::UNIX_EPOCH
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn make_row(user: &str, message_id: &str, filename: &str, at: DateTime<Utc>) -> HistoryRow {
        HistoryRow {
            user_email: user.to_string(),
            message_id: message_id.to_string(),
            subject: "Factura enero".to_string(),
            sender: "ACME <billing@acme.test>".to_string(),
            filename: filename.to_string(),
            generation_code: Some("ABC123".to_string()),
            control_number: Some("DTE-01-0001".to_string()),
            issuer_name: Some("ACME".to_string()),
            receiver_name: None,
            total_amount: Some(113.5),
            downloaded_at: at,
        }
    }

    #[test]
    fn test_save_and_list_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SqliteHistoryStore::new(dir.path().join("history.test.sqlite")).unwrap();

        let at = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();
        let row = make_row("me@x.test", "m1", "data.json", at);
        store.save_history(std::slice::from_ref(&row)).unwrap();

        let rows = store.list_history("me@x.test").unwrap();
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn test_list_is_newest_first_and_per_user() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap();

        store
            .save_history(&[
                make_row("me@x.test", "old", "a.pdf", base),
                make_row("other@x.test", "theirs", "b.pdf", base + Duration::hours(2)),
                make_row("me@x.test", "new", "c.pdf", base + Duration::hours(1)),
            ])
            .unwrap();

        let ids: Vec<String> = store
            .list_history("me@x.test")
            .unwrap()
            .into_iter()
            .map(|r| r.message_id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_downloaded_ids_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.test.sqlite");

        {
            let store = SqliteHistoryStore::new(&path).unwrap();
            store
                .save_history(&[make_row("me@x.test", "m1", "a.pdf", Utc::now())])
                .unwrap();
        }

        let store = SqliteHistoryStore::new(&path).unwrap();
        let ids = store.downloaded_message_ids("me@x.test").unwrap();
        assert!(ids.contains("m1"));
    }

    #[test]
    fn test_empty_batch_is_ok() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        store.save_history(&[]).unwrap();
        assert!(store.list_history("me@x.test").unwrap().is_empty());
    }
}
