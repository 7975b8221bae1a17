//! Invoices crate - Business logic for retrieving tax documents from Gmail
//!
//! This crate provides:
//! - Domain models (MessageSummary, AttachmentDescriptor, TaxDocumentMetadata)
//! - Gmail API client, OAuth authentication and the `MailProvider` seam
//! - Invoice search (query building, attachment discovery, summaries)
//! - ZIP archive assembly with DTE correlation
//! - Download history stores
//!
//! This crate has no UI dependencies; the `facturas` CLI is one front end.

pub mod archive;
pub mod config;
pub mod gmail;
pub mod history;
pub mod models;
pub mod search;

pub use archive::{
    ARCHIVE_FILENAME, ARCHIVE_MIME_TYPE, ArchiveResult, METADATA_HEADER, assemble_archive,
};
pub use config::{GmailCredentials, HistoryBackend, Settings};
pub use gmail::{
    AccessToken, GmailAuth, GmailClient, InMemoryProvider, MailProvider, MessageFormat,
    ProviderError,
};
pub use history::{
    HistoryRow, HistoryStore, InMemoryHistoryStore, SqliteHistoryStore, SupabaseHistoryStore,
    history_rows,
};
pub use models::{
    AttachmentDescriptor, MessageId, MessageSummary, SelectedMessage, TaxDocumentMetadata,
};
pub use search::{SearchQuery, find_attachments, search_invoices, summarize_message};
