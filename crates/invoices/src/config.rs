//! Configuration loading
//!
//! OAuth credentials are loaded from (in order of priority):
//! 1. Compile-time embedded credentials (for release builds)
//! 2. JSON file (Google Cloud Console format)
//! 3. Runtime environment variables (fallback)
//!
//! Application settings live in `settings.json` in the config directory.
//! Every field is optional.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::history::{HistoryStore, SqliteHistoryStore, SupabaseHistoryStore};

/// Credentials filename in the config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Settings filename in the config directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Default SQLite history database filename
const HISTORY_DB_FILE: &str = "history.db";

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_KEY_ENV: &str = "SUPABASE_KEY";

/// OAuth credentials for Gmail API access
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    /// Load credentials from the first available source
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Credentials embedded at build time.
    /// Build with: GOOGLE_CLIENT_ID=xxx GOOGLE_CLIENT_SECRET=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Desktop clients use "installed", web clients use "web"
        let installed = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        Ok(Self {
            client_id: installed.client_id,
            client_secret: installed.client_secret,
        })
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GMAIL_CLIENT_ID")
            .context("GMAIL_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GMAIL_CLIENT_SECRET")
            .context("GMAIL_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// Default credentials file path (~/.config/facturas/google-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

/// Where download history is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    Sqlite,
    Supabase,
    /// History is neither recorded nor consulted
    Off,
}

/// Contents of `settings.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Explicit backend choice; see [`Settings::history_backend`]
    pub history: Option<HistoryBackend>,
    /// SQLite database path (defaults to `history.db` in the config dir)
    pub history_db: Option<PathBuf>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

impl Settings {
    /// Load `settings.json` (if present) and apply environment overrides
    pub fn load() -> Result<Self> {
        let settings = if config::config_exists(SETTINGS_FILE) {
            config::load_json(SETTINGS_FILE)?
        } else {
            Self::default()
        };

        Ok(settings.with_overrides(|name| std::env::var(name).ok()))
    }

    /// Apply `SUPABASE_URL` / `SUPABASE_KEY` from `lookup`
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(SUPABASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = lookup(SUPABASE_KEY_ENV).filter(|v| !v.is_empty()) {
            self.supabase_key = Some(key);
        }
        self
    }

    /// Backend in effect: the explicit choice, else Supabase when both its
    /// URL and key are known, else SQLite
    pub fn history_backend(&self) -> HistoryBackend {
        self.history.unwrap_or({
            if self.supabase_url.is_some() && self.supabase_key.is_some() {
                HistoryBackend::Supabase
            } else {
                HistoryBackend::Sqlite
            }
        })
    }

    /// SQLite database path in effect
    pub fn history_db_path(&self) -> Result<PathBuf> {
        match &self.history_db {
            Some(path) => Ok(path.clone()),
            None => config::config_path(HISTORY_DB_FILE)
                .context("Could not determine config directory"),
        }
    }

    /// Open the configured history store, or `None` when history is off
    pub fn open_history_store(&self) -> Result<Option<Box<dyn HistoryStore>>> {
        match self.history_backend() {
            HistoryBackend::Off => Ok(None),
            HistoryBackend::Sqlite => {
                let path = self.history_db_path()?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create history directory {:?}", parent)
                    })?;
                }
                log::debug!("[HISTORY] Using SQLite at {:?}", path);
                Ok(Some(Box::new(SqliteHistoryStore::new(&path)?)))
            }
            HistoryBackend::Supabase => {
                let (Some(url), Some(key)) = (&self.supabase_url, &self.supabase_key) else {
                    bail!(
                        "Supabase history needs both {} and {}",
                        SUPABASE_URL_ENV,
                        SUPABASE_KEY_ENV
                    );
                };
                log::debug!("[HISTORY] Using Supabase at {}", url);
                Ok(Some(Box::new(SupabaseHistoryStore::new(url, key.clone())?)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_installed_credentials() {
        let json = r#"{
            "installed": {
                "client_id": "test-client-id.apps.googleusercontent.com",
                "client_secret": "test-secret",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }"#;

        let creds = GmailCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "test-secret");
    }

    #[test]
    fn test_parse_web_credentials() {
        let json = r#"{"web": {"client_id": "web-id", "client_secret": "web-secret"}}"#;
        let creds = GmailCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "web-id");
    }

    #[test]
    fn test_invalid_credentials_json() {
        assert!(GmailCredentials::from_json(r#"{ "other": {} }"#).is_err());
    }

    #[test]
    fn test_settings_defaults_to_sqlite() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.history_backend(), HistoryBackend::Sqlite);
    }

    #[test]
    fn test_supabase_env_selects_supabase() {
        let settings = Settings::default().with_overrides(|name| match name {
            SUPABASE_URL_ENV => Some("https://xyz.supabase.co".to_string()),
            SUPABASE_KEY_ENV => Some("anon-key".to_string()),
            _ => None,
        });
        assert_eq!(settings.history_backend(), HistoryBackend::Supabase);
        assert_eq!(settings.supabase_key.as_deref(), Some("anon-key"));
    }

    #[test]
    fn test_explicit_backend_wins() {
        let settings: Settings = serde_json::from_str(
            r#"{"history": "off", "supabaseUrl": "https://x.test", "supabaseKey": "k"}"#,
        )
        .unwrap();
        assert_eq!(settings.history_backend(), HistoryBackend::Off);
        assert!(settings.open_history_store().unwrap().is_none());
    }

    #[test]
    fn test_supabase_without_key_fails_to_open() {
        let settings: Settings =
            serde_json::from_str(r#"{"history": "supabase", "supabaseUrl": "https://x.test"}"#)
                .unwrap();
        assert!(settings.open_history_store().is_err());
    }

    #[test]
    fn test_sqlite_store_opens_at_configured_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");
        let settings = Settings {
            history_db: Some(path.clone()),
            ..Default::default()
        };

        let store = settings.open_history_store().unwrap().unwrap();
        assert!(store.list_history("me@x.test").unwrap().is_empty());
        assert!(path.exists());
    }
}
