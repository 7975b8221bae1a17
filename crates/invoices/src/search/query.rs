//! Gmail query construction for invoice searches
//!
//! Produces queries like:
//! `(factura OR comprobante OR ... OR FACT-) acme has:attachment after:2024/01/01 before:2024/02/01`

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Terms that usually appear in invoice and receipt emails
pub const INVOICE_KEYWORDS: [&str; 7] = [
    "factura",
    "comprobante",
    "recibo",
    "pago",
    "DTE",
    "documento tributario",
    "FACT-",
];

/// File type value meaning "no filename filter"
pub const ALL_FILE_TYPES: &str = "all";

/// Search filters supplied by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text term ANDed with the keyword group (may be empty)
    pub term: String,
    /// Inclusive lower bound, `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`
    pub end_date: Option<String>,
    /// Extension filter (`pdf`, `xml`, `json`) or `all`
    pub file_type: String,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            term: String::new(),
            start_date: None,
            end_date: None,
            file_type: ALL_FILE_TYPES.to_string(),
        }
    }
}

impl SearchQuery {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Self::default()
        }
    }

    pub fn between(mut self, start_date: Option<String>, end_date: Option<String>) -> Self {
        self.start_date = start_date;
        self.end_date = end_date;
        self
    }

    pub fn file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = file_type.into();
        self
    }

    /// Render the Gmail search query
    pub fn to_gmail_query(&self) -> String {
        let mut parts = vec![keyword_group()];

        let term = self.term.trim();
        if !term.is_empty() {
            parts.push(term.to_lowercase());
        }

        parts.push("has:attachment".to_string());

        let file_type = self.file_type.trim();
        if !file_type.is_empty() && !file_type.eq_ignore_ascii_case(ALL_FILE_TYPES) {
            parts.push(format!("filename:{}", file_type));
        }

        if let Some(start) = non_blank(&self.start_date) {
            parts.push(format!("after:{}", slashed(start)));
        }

        if let Some(end) = non_blank(&self.end_date) {
            parts.push(format!("before:{}", exclusive_upper_bound(end)));
        }

        parts.join(" ")
    }
}

/// `(a OR b OR "multi word")`
fn keyword_group() -> String {
    let keywords: Vec<String> = INVOICE_KEYWORDS
        .iter()
        .map(|k| {
            if k.contains(' ') {
                format!("\"{}\"", k)
            } else {
                k.to_string()
            }
        })
        .collect();
    format!("({})", keywords.join(" OR "))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn slashed(date: &str) -> String {
    date.replace('-', "/")
}

/// Gmail's `before:` excludes the given day, so the bound moves one day later.
/// Unparseable input passes through with separators normalized.
fn exclusive_upper_bound(end_date: &str) -> String {
    NaiveDate::parse_from_str(end_date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .map(|d| d.format("%Y/%m/%d").to_string())
        .unwrap_or_else(|| slashed(end_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYWORDS: &str =
        "(factura OR comprobante OR recibo OR pago OR DTE OR \"documento tributario\" OR FACT-)";

    #[test]
    fn test_default_query() {
        let query = SearchQuery::default().to_gmail_query();
        assert_eq!(query, format!("{} has:attachment", KEYWORDS));
    }

    #[test]
    fn test_full_query_makes_end_date_inclusive() {
        let query = SearchQuery::new("acme")
            .between(Some("2024-01-01".into()), Some("2024-01-31".into()))
            .to_gmail_query();

        assert_eq!(
            query,
            format!(
                "{} acme has:attachment after:2024/01/01 before:2024/02/01",
                KEYWORDS
            )
        );
    }

    #[test]
    fn test_end_date_rolls_over_year() {
        let query = SearchQuery::default()
            .between(None, Some("2023-12-31".into()))
            .to_gmail_query();
        assert!(query.ends_with("before:2024/01/01"));
    }

    #[test]
    fn test_unparseable_end_date_passes_through() {
        let query = SearchQuery::default()
            .between(None, Some("2024-13-45".into()))
            .to_gmail_query();
        assert!(query.ends_with("before:2024/13/45"));
    }

    #[test]
    fn test_file_type_filter() {
        let query = SearchQuery::default().file_type("pdf").to_gmail_query();
        assert!(query.ends_with("has:attachment filename:pdf"));

        let query = SearchQuery::default().file_type("ALL").to_gmail_query();
        assert!(!query.contains("filename:"));
    }

    #[test]
    fn test_term_is_trimmed_and_lowercased() {
        let query = SearchQuery::new("  ACME Corp ").to_gmail_query();
        assert!(query.contains(") acme corp has:attachment"));
    }

    #[test]
    fn test_blank_dates_are_ignored() {
        let query = SearchQuery::default()
            .between(Some("".into()), Some("  ".into()))
            .to_gmail_query();
        assert!(!query.contains("after:"));
        assert!(!query.contains("before:"));
    }
}
