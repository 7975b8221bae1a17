//! Attachment descriptor discovered in a message's part tree

use serde::{Deserialize, Serialize};

/// File extensions (lowercase, without the dot) worth downloading
pub const ELIGIBLE_EXTENSIONS: [&str; 3] = ["pdf", "xml", "json"];

/// Reference to a retrievable attachment of a Gmail message
///
/// Identity is `attachment_id` within the owning message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    /// Original filename as sent (never empty)
    pub filename: String,
    /// MIME type reported by Gmail
    pub mime_type: String,
    /// Gmail attachment handle, needed for the binary download
    pub attachment_id: String,
}

impl AttachmentDescriptor {
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        attachment_id: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            attachment_id: attachment_id.into(),
        }
    }

    /// Whether this attachment may carry a structured tax document
    pub fn is_json(&self) -> bool {
        dotted_suffix(&self.filename, "json").is_some()
    }

    /// Extension of the original filename including the dot (e.g. ".pdf")
    ///
    /// A bare `".pdf"` has no stem but still yields `".pdf"`.
    pub fn extension(&self) -> &str {
        match split_extension(&self.filename) {
            (_, "") => eligible_suffix(&self.filename).unwrap_or(""),
            (_, ext) => ext,
        }
    }
}

/// Check whether a filename ends in one of [`ELIGIBLE_EXTENSIONS`] (case-insensitive)
pub fn is_eligible_filename(filename: &str) -> bool {
    eligible_suffix(filename).is_some()
}

fn eligible_suffix(filename: &str) -> Option<&str> {
    ELIGIBLE_EXTENSIONS
        .iter()
        .find_map(|ext| dotted_suffix(filename, ext))
}

/// `"." + ext` at the end of `filename`, matched case-insensitively
fn dotted_suffix<'a>(filename: &'a str, ext: &str) -> Option<&'a str> {
    let start = filename.len().checked_sub(ext.len() + 1)?;
    let suffix = filename.get(start..)?;
    (suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(ext)).then_some(suffix)
}

/// Split a filename into stem and extension, keeping the dot on the extension
///
/// Leading dots do not start an extension: `".env"` has none.
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if filename[..idx].chars().any(|c| c != '.') => {
            (&filename[..idx], &filename[idx..])
        }
        _ => (filename, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligible_extensions_case_insensitive() {
        assert!(is_eligible_filename("factura.pdf"));
        assert!(is_eligible_filename("FACTURA.PDF"));
        assert!(is_eligible_filename("dte.Json"));
        assert!(is_eligible_filename("timbre.xml"));
        assert!(!is_eligible_filename("photo.jpg"));
        assert!(!is_eligible_filename("archive.pdf.zip"));
        assert!(!is_eligible_filename("pdf"));
        assert!(!is_eligible_filename("résumé"));
    }

    #[test]
    fn test_bare_extension_is_eligible() {
        assert!(is_eligible_filename(".pdf"));
        assert!(is_eligible_filename(".JSON"));

        let bare = AttachmentDescriptor::new(".json", "application/json", "att-3");
        assert!(bare.is_json());
        assert_eq!(bare.extension(), ".json");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("invoice.pdf"), ("invoice", ".pdf"));
        assert_eq!(split_extension("a.b.json"), ("a.b", ".json"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".env"), (".env", ""));
        assert_eq!(split_extension("..hidden.xml"), ("..hidden", ".xml"));
    }

    #[test]
    fn test_descriptor_helpers() {
        let att = AttachmentDescriptor::new("Data.JSON", "application/json", "att-1");
        assert!(att.is_json());
        assert_eq!(att.extension(), ".JSON");

        let pdf = AttachmentDescriptor::new("data.pdf", "application/pdf", "att-2");
        assert!(!pdf.is_json());
    }
}
