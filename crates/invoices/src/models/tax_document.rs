//! Metadata extracted from structured tax documents (DTE JSON)

use super::MessageId;
use serde::{Deserialize, Serialize};

/// Identification recovered from a message's DTE JSON attachment
///
/// At most one per message. `source_filename` is always the attachment's
/// original name, even when the archive entry was renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxDocumentMetadata {
    pub message_id: MessageId,
    /// `identificacion.codigoGeneracion`
    pub generation_code: Option<String>,
    /// `emisor.nombre`
    pub issuer_name: Option<String>,
    /// `identificacion.numeroControl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_number: Option<String>,
    /// `receptor.nombre`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_name: Option<String>,
    /// `resumen.totalPagar`, else `resumen.montoTotalOperacion`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    pub source_filename: String,
}
