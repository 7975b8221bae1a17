//! Invoice search: query construction, attachment discovery and summaries
//!
//! Flow: [`SearchQuery`] → Gmail query string → message IDs →
//! [`summarize_message`] per ID (using [`find_attachments`]).

mod locate;
mod query;
mod summarize;

pub use locate::find_attachments;
pub use query::{ALL_FILE_TYPES, INVOICE_KEYWORDS, SearchQuery};
pub use summarize::{
    DATE_CHARS, MAX_SEARCH_RESULTS, SNIPPET_CHARS, list_message_ids, search_invoices, summarize,
    summarize_message,
};
