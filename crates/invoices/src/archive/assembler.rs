//! ZIP assembly for selected invoice attachments
//!
//! Each message is processed in two passes:
//! 1. Its JSON attachments are scanned, in order, for a DTE generation code.
//!    The first one that yields a code wins and is recorded as metadata.
//! 2. Every attachment is downloaded and written. With a code, entries are
//!    named `DTE_<code><ext>`; without one they keep their original name.
//!
//! Names are made unique across the whole archive. A failed download writes
//! an `ERROR_<filename>.txt` placeholder instead of aborting the batch.

use anyhow::{Context, Result};
use base64::prelude::*;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::dte::parse_dte;
use super::names::{NameRegistry, sanitize_entry_name};
use crate::gmail::MailProvider;
use crate::models::{AttachmentDescriptor, MessageId, SelectedMessage, TaxDocumentMetadata};

/// Prefix of entries renamed after a DTE generation code
pub const DTE_PREFIX: &str = "DTE";

/// Prefix of placeholder entries for failed downloads
pub const ERROR_PREFIX: &str = "ERROR_";

/// An assembled archive and what was recognized while building it
#[derive(Debug, Clone)]
pub struct ArchiveResult {
    /// ZIP file bytes
    pub archive: Vec<u8>,
    /// One entry per message whose DTE JSON carried a generation code
    pub metadata: Vec<TaxDocumentMetadata>,
    /// Entry names in the order they were written
    pub entries: Vec<String>,
    /// Placeholder entries written for failed downloads
    pub failed: Vec<String>,
}

impl ArchiveResult {
    /// Metadata serialized as JSON, for delivery alongside the archive
    pub fn metadata_header_value(&self) -> Result<String> {
        serde_json::to_string(&self.metadata).context("Failed to serialize DTE metadata")
    }

    /// Number of placeholder entries written for failed downloads
    pub fn failed_entries(&self) -> usize {
        self.failed.len()
    }
}

/// Download the selected attachments and bundle them into one ZIP
///
/// Only failures of the archive writer itself are returned as errors;
/// per-attachment failures become placeholder entries.
pub fn assemble_archive(
    provider: &dyn MailProvider,
    selections: &[SelectedMessage],
) -> Result<ArchiveResult> {
    let mut builder = ArchiveBuilder::new();

    for selection in selections {
        builder.add_message(provider, selection)?;
    }

    let result = builder.finish()?;
    info!(
        "[ARCHIVE] Built archive: {} entries ({} failed), {} DTE documents, {} bytes",
        result.entries.len(),
        result.failed_entries(),
        result.metadata.len(),
        result.archive.len()
    );
    Ok(result)
}

/// Archive state for one invocation
struct ArchiveBuilder {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    names: NameRegistry,
    metadata: Vec<TaxDocumentMetadata>,
    entries: Vec<String>,
    failed: Vec<String>,
}

impl ArchiveBuilder {
    fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            names: NameRegistry::new(),
            metadata: Vec::new(),
            entries: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn add_message(&mut self, provider: &dyn MailProvider, selection: &SelectedMessage) -> Result<()> {
        // Content fetched while correlating, reused when writing
        let mut downloaded: HashMap<String, Vec<u8>> = HashMap::new();

        let correlation = correlate(provider, selection, &mut downloaded);
        let code = correlation
            .as_ref()
            .and_then(|m| m.generation_code.clone());
        if let Some(metadata) = correlation {
            self.metadata.push(metadata);
        }

        for attachment in &selection.attachments {
            let content = match downloaded.remove(&attachment.attachment_id) {
                Some(bytes) => Ok(bytes),
                None => download_attachment(provider, &selection.id, attachment),
            };

            match content {
                Ok(bytes) => {
                    let candidate = target_name(attachment, code.as_deref());
                    self.write_entry(&candidate, &bytes)?;
                }
                Err(e) => {
                    warn!(
                        "[ARCHIVE] Failed to download {} from message {}: {:#}",
                        attachment.filename, selection.id, e
                    );
                    let placeholder = format!("{}{}.txt", ERROR_PREFIX, attachment.filename);
                    let name = self.write_entry(&placeholder, format!("{:#}", e).as_bytes())?;
                    self.failed.push(name);
                }
            }
        }

        Ok(())
    }

    /// Write one entry under a collision-free name
    fn write_entry(&mut self, candidate: &str, content: &[u8]) -> Result<String> {
        let name = self.names.claim(&sanitize_entry_name(candidate));

        self.zip
            .start_file(name.as_str(), entry_options())
            .with_context(|| format!("Failed to start archive entry {}", name))?;
        self.zip
            .write_all(content)
            .with_context(|| format!("Failed to write archive entry {}", name))?;

        debug!("[ARCHIVE] Wrote {} ({} bytes)", name, content.len());
        self.entries.push(name.clone());
        Ok(name)
    }

    fn finish(self) -> Result<ArchiveResult> {
        let cursor = self.zip.finish().context("Failed to finalize archive")?;
        Ok(ArchiveResult {
            archive: cursor.into_inner(),
            metadata: self.metadata,
            entries: self.entries,
            failed: self.failed,
        })
    }
}

/// Fixed timestamps keep the archive bytes reproducible for a given input
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
}

/// Find the message's DTE generation code in its first recognizable JSON attachment
fn correlate(
    provider: &dyn MailProvider,
    selection: &SelectedMessage,
    downloaded: &mut HashMap<String, Vec<u8>>,
) -> Option<TaxDocumentMetadata> {
    for attachment in selection.attachments.iter().filter(|a| a.is_json()) {
        let bytes = match download_attachment(provider, &selection.id, attachment) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("[ARCHIVE] Skipping {} for DTE lookup: {:#}", attachment.filename, e);
                continue;
            }
        };

        let fields = parse_dte(&bytes);
        downloaded.insert(attachment.attachment_id.clone(), bytes);

        if let Some(fields) = fields {
            debug!(
                "[ARCHIVE] Message {} identified as DTE {} via {}",
                selection.id, fields.generation_code, attachment.filename
            );
            return Some(TaxDocumentMetadata {
                message_id: selection.id.clone(),
                generation_code: Some(fields.generation_code),
                issuer_name: fields.issuer_name,
                control_number: fields.control_number,
                receiver_name: fields.receiver_name,
                total_amount: fields.total_amount,
                source_filename: attachment.filename.clone(),
            });
        }
    }

    None
}

/// Entry name before collision resolution
fn target_name(attachment: &AttachmentDescriptor, generation_code: Option<&str>) -> String {
    match generation_code {
        Some(code) => format!("{}_{}{}", DTE_PREFIX, code, attachment.extension()),
        None => attachment.filename.clone(),
    }
}

/// Fetch and decode one attachment
fn download_attachment(
    provider: &dyn MailProvider,
    message_id: &MessageId,
    attachment: &AttachmentDescriptor,
) -> Result<Vec<u8>> {
    let data = provider
        .get_attachment(message_id, &attachment.attachment_id)
        .with_context(|| format!("Failed to download attachment {}", attachment.filename))?;

    decode_attachment_data(&data)
        .with_context(|| format!("Failed to decode attachment {}", attachment.filename))
}

/// Decode Gmail attachment data
///
/// Gmail uses URL-safe base64 but padding can vary, so we try multiple decoders.
pub fn decode_attachment_data(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let data = data.trim();
    BASE64_URL_SAFE
        .decode(data)
        .or_else(|_| BASE64_URL_SAFE_NO_PAD.decode(data))
        .or_else(|_| BASE64_STANDARD.decode(data))
        .or_else(|_| BASE64_STANDARD_NO_PAD.decode(data))
}
