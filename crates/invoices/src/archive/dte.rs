//! Best-effort reading of DTE (electronic tax document) JSON payloads
//!
//! Anything that is not JSON, or lacks a generation code, yields `None`.

use serde_json::Value;

/// Fields read from one DTE document
#[derive(Debug, Clone, PartialEq)]
pub struct DteFields {
    pub generation_code: String,
    pub issuer_name: Option<String>,
    pub control_number: Option<String>,
    pub receiver_name: Option<String>,
    pub total_amount: Option<f64>,
}

const GENERATION_CODE: &str = "/identificacion/codigoGeneracion";
const CONTROL_NUMBER: &str = "/identificacion/numeroControl";
const ISSUER_NAME: &str = "/emisor/nombre";
const RECEIVER_NAME: &str = "/receptor/nombre";
const TOTAL_AMOUNTS: [&str; 2] = ["/resumen/totalPagar", "/resumen/montoTotalOperacion"];

/// Parse attachment bytes as a DTE document
pub fn parse_dte(bytes: &[u8]) -> Option<DteFields> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let doc: Value = serde_json::from_slice(bytes).ok()?;

    Some(DteFields {
        generation_code: text_at(&doc, GENERATION_CODE)?,
        issuer_name: text_at(&doc, ISSUER_NAME),
        control_number: text_at(&doc, CONTROL_NUMBER),
        receiver_name: text_at(&doc, RECEIVER_NAME),
        total_amount: TOTAL_AMOUNTS
            .iter()
            .find_map(|path| doc.pointer(path).and_then(Value::as_f64)),
    })
}

/// Non-blank string at a JSON pointer, trimmed
fn text_at(doc: &Value, pointer: &str) -> Option<String> {
    doc.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
