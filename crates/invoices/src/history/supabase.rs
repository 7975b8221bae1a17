//! Supabase (PostgREST) history store
//!
//! Rows live in the `historial_facturas` table. Column names follow the
//! table's Spanish schema; the mapping is local to this module.
//!
//! Only the table's nine data columns are written or read. The DTE issuer
//! name and the download time stay local: remote rows come back without an
//! issuer and with the epoch as `downloaded_at`, in the order the server
//! returns them.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{HistoryRow, HistoryStore};

/// Table holding download history
const TABLE: &str = "historial_facturas";

/// Columns of `historial_facturas` this store writes and reads
const COLUMNS: [&str; 9] = [
    "usuario_email",
    "asunto_correo",
    "nombre_archivo",
    "emisor",
    "codigo_generacion",
    "numero_control",
    "monto_total",
    "receptor_nombre",
    "gmail_message_id",
];

/// History store backed by a Supabase REST endpoint
pub struct SupabaseHistoryStore {
    endpoint: Url,
    api_key: String,
}

/// Row as stored in `historial_facturas`
#[derive(Debug, Serialize, Deserialize)]
struct RemoteRow {
    usuario_email: String,
    asunto_correo: String,
    nombre_archivo: String,
    /// Sender header of the message
    emisor: String,
    #[serde(default)]
    codigo_generacion: Option<String>,
    #[serde(default)]
    numero_control: Option<String>,
    #[serde(default)]
    monto_total: Option<f64>,
    #[serde(default)]
    receptor_nombre: Option<String>,
    #[serde(default)]
    gmail_message_id: Option<String>,
}

impl From<&HistoryRow> for RemoteRow {
    fn from(row: &HistoryRow) -> Self {
        Self {
            usuario_email: row.user_email.clone(),
            asunto_correo: row.subject.clone(),
            nombre_archivo: row.filename.clone(),
            emisor: row.sender.clone(),
            codigo_generacion: row.generation_code.clone(),
            numero_control: row.control_number.clone(),
            monto_total: row.total_amount,
            receptor_nombre: row.receiver_name.clone(),
            gmail_message_id: Some(row.message_id.clone()),
        }
    }
}

impl From<RemoteRow> for HistoryRow {
    fn from(row: RemoteRow) -> Self {
        Self {
            user_email: row.usuario_email,
            message_id: row.gmail_message_id.unwrap_or_default(),
            subject: row.asunto_correo,
            sender: row.emisor,
            filename: row.nombre_archivo,
            generation_code: row.codigo_generacion,
            control_number: row.numero_control,
            issuer_name: None,
            receiver_name: row.receptor_nombre,
            total_amount: row.monto_total,
            downloaded_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl SupabaseHistoryStore {
    /// Create a store for the project at `base_url` (e.g. `https://xyz.supabase.co`)
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join(&format!("/rest/v1/{}", TABLE)))
            .with_context(|| format!("Invalid Supabase URL: {}", base_url))?;

        Ok(Self {
            endpoint,
            api_key: api_key.into(),
        })
    }

    /// URL listing one user's rows
    fn list_url(&self, user_email: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("usuario_email", &format!("eq.{}", user_email))
            .append_pair("select", &COLUMNS.join(","));
        url
    }
}

impl HistoryStore for SupabaseHistoryStore {
    fn save_history(&self, rows: &[HistoryRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let remote: Vec<RemoteRow> = rows.iter().map(RemoteRow::from).collect();

        ureq::post(self.endpoint.as_str())
            .header("apikey", &self.api_key)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Prefer", "return=minimal")
            .send_json(&remote)
            .context("Failed to save history to Supabase")?;

        log::debug!("[HISTORY] Sent {} rows to Supabase", rows.len());
        Ok(())
    }

    fn list_history(&self, user_email: &str) -> Result<Vec<HistoryRow>> {
        let mut response = ureq::get(self.list_url(user_email).as_str())
            .header("apikey", &self.api_key)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .call()
            .context("Failed to fetch history from Supabase")?;

        let rows: Vec<RemoteRow> = response
            .body_mut()
            .read_json()
            .context("Failed to parse Supabase history response")?;

        Ok(rows.into_iter().map(HistoryRow::from).collect())
    }
}
