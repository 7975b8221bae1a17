//! Archive assembly for selected invoice attachments

mod assembler;
mod dte;
mod names;

pub use assembler::{
    ArchiveResult, DTE_PREFIX, ERROR_PREFIX, assemble_archive, decode_attachment_data,
};
pub use dte::{DteFields, parse_dte};
pub use names::{NameRegistry, sanitize_entry_name};

/// Download filename offered for the assembled archive
pub const ARCHIVE_FILENAME: &str = "facturas_descargadas.zip";

/// MIME type of the assembled archive
pub const ARCHIVE_MIME_TYPE: &str = "application/zip";

/// Header carrying [`ArchiveResult::metadata_header_value`] next to the archive
pub const METADATA_HEADER: &str = "X-DTE-Metadata";
