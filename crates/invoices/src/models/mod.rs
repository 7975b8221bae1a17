//! Domain models for invoice retrieval

mod attachment;
mod message;
mod tax_document;

pub use attachment::{AttachmentDescriptor, ELIGIBLE_EXTENSIONS, is_eligible_filename, split_extension};
pub use message::{MessageId, MessageSummary, SelectedMessage};
pub use tax_document::TaxDocumentMetadata;
