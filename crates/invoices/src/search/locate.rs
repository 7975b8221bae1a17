//! Attachment discovery in Gmail part trees

use crate::gmail::api::MessagePart;
use crate::models::{AttachmentDescriptor, is_eligible_filename};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Recursively collect eligible attachments from message parts
///
/// Pre-order and depth-first: a part is checked before its children, and
/// siblings keep their order. A part can be an attachment and also contain
/// sub-parts; both are handled.
pub fn find_attachments(parts: &[MessagePart]) -> Vec<AttachmentDescriptor> {
    let mut found = Vec::new();
    collect_attachments(parts, &mut found);
    found
}

fn collect_attachments(parts: &[MessagePart], found: &mut Vec<AttachmentDescriptor>) {
    for part in parts {
        if let Some(descriptor) = as_attachment(part) {
            found.push(descriptor);
        }

        if let Some(nested) = &part.parts {
            collect_attachments(nested, found);
        }
    }
}

/// Descriptor for a part that is a downloadable, eligible attachment
fn as_attachment(part: &MessagePart) -> Option<AttachmentDescriptor> {
    let filename = part.filename.as_deref().filter(|f| !f.is_empty())?;
    let attachment_id = part
        .body
        .as_ref()?
        .attachment_id
        .as_deref()
        .filter(|id| !id.is_empty())?;

    if !is_eligible_filename(filename) {
        return None;
    }

    Some(AttachmentDescriptor::new(
        filename,
        part.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE),
        attachment_id,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::MessageBody;

    fn attachment(filename: &str, id: &str) -> MessagePart {
        MessagePart {
            filename: Some(filename.to_string()),
            mime_type: Some("application/pdf".to_string()),
            body: Some(MessageBody {
                attachment_id: Some(id.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn container(children: Vec<MessagePart>) -> MessagePart {
        MessagePart {
            mime_type: Some("multipart/mixed".to_string()),
            parts: Some(children),
            ..Default::default()
        }
    }

    fn names(found: &[AttachmentDescriptor]) -> Vec<&str> {
        found.iter().map(|a| a.filename.as_str()).collect()
    }

    #[test]
    fn test_empty_tree() {
        assert!(find_attachments(&[]).is_empty());
    }

    #[test]
    fn test_filters_ineligible_extensions() {
        let parts = vec![
            attachment("factura.pdf", "a1"),
            attachment("logo.png", "a2"),
            attachment("DTE.JSON", "a3"),
            attachment("timbre.xml", "a4"),
        ];
        assert_eq!(
            names(&find_attachments(&parts)),
            vec!["factura.pdf", "DTE.JSON", "timbre.xml"]
        );
    }

    #[test]
    fn test_preorder_depth_first() {
        let parts = vec![
            container(vec![
                attachment("1.pdf", "a1"),
                container(vec![attachment("2.xml", "a2")]),
                attachment("3.json", "a3"),
            ]),
            attachment("4.pdf", "a4"),
        ];
        assert_eq!(
            names(&find_attachments(&parts)),
            vec!["1.pdf", "2.xml", "3.json", "4.pdf"]
        );
    }

    #[test]
    fn test_attachment_part_with_children_yields_both() {
        let mut parent = attachment("outer.pdf", "a1");
        parent.parts = Some(vec![attachment("inner.xml", "a2")]);

        assert_eq!(
            names(&find_attachments(&[parent])),
            vec!["outer.pdf", "inner.xml"]
        );
    }

    #[test]
    fn test_requires_filename_and_attachment_id() {
        let mut inline = attachment("inline.pdf", "a1");
        inline.body = Some(MessageBody {
            data: Some("JVBERi0=".to_string()),
            ..Default::default()
        });

        let mut unnamed = attachment("", "a2");
        unnamed.filename = Some(String::new());

        let mut empty_id = attachment("empty.pdf", "");
        empty_id.mime_type = None;

        assert!(find_attachments(&[inline, unnamed, empty_id]).is_empty());
    }

    #[test]
    fn test_missing_mime_type_defaults() {
        let mut part = attachment("x.pdf", "a1");
        part.mime_type = None;
        let found = find_attachments(&[part]);
        assert_eq!(found[0].mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(found[0].attachment_id, "a1");
    }
}
