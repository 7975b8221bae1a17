//! Gmail OAuth2 authentication
//!
//! Implements the OAuth2 authorization code flow for read-only Gmail access.
//! Uses a local HTTP server to receive the OAuth callback and stores tokens
//! in the config directory. Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;

use super::ProviderError;
use super::client::classify_failure;

/// Bearer token for Gmail API calls
///
/// Passed explicitly to every client; `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// OAuth2 configuration and token management for Gmail
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
}

/// Stored token data
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

impl StoredToken {
    /// Whether the access token is still good for at least five minutes
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at > now + 300)
    }
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[allow(dead_code)]
    token_type: String,
}

impl GmailAuth {
    /// Gmail API OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Read-only mailbox access is all that invoice retrieval needs
    const GMAIL_READONLY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.readonly";

    /// Port range to try for local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// Token file inside the config directory
    pub const TOKEN_FILE: &'static str = "gmail-tokens.json";

    /// Create a new GmailAuth instance storing tokens in the config directory
    ///
    /// # Arguments
    /// * `client_id` - OAuth2 client ID from Google Cloud Console
    /// * `client_secret` - OAuth2 client secret from Google Cloud Console
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let token_path =
            config::config_path(Self::TOKEN_FILE).context("Could not determine config directory")?;
        Ok(Self::with_token_path(client_id, client_secret, token_path))
    }

    /// Create a GmailAuth that keeps its tokens at an explicit path
    pub fn with_token_path(client_id: String, client_secret: String, token_path: PathBuf) -> Self {
        Self {
            client_id,
            client_secret,
            token_path,
        }
    }

    /// Get a valid access token from storage, refreshing it if needed
    ///
    /// Never opens a browser. Fails when no token was stored yet, and with
    /// [`ProviderError::TokenExpired`] when Google rejects the refresh token.
    pub fn access_token(&self) -> Result<AccessToken> {
        let token = self
            .load_token()
            .context("Not signed in to Gmail; run `facturas login` first")?;

        if token.is_fresh(chrono::Utc::now().timestamp()) {
            return Ok(AccessToken::new(token.access_token));
        }

        let refresh_token = token.refresh_token.ok_or(ProviderError::TokenExpired)?;
        let new_token = self.refresh_access_token(&refresh_token)?;
        self.save_token_response(&new_token)?;
        Ok(AccessToken::new(new_token.access_token))
    }

    /// Run the interactive authorization code flow and store the tokens
    pub fn sign_in(&self) -> Result<AccessToken> {
        let token = self.authorization_code_auth()?;
        self.save_token_response(&token)?;
        Ok(AccessToken::new(token.access_token))
    }

    /// Perform authorization code flow authentication
    fn authorization_code_auth(&self) -> Result<TokenResponse> {
        // Step 1: Start local server to receive callback
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);

        // Step 2: Build authorization URL
        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(Self::GMAIL_READONLY_SCOPE),
        );

        println!("\n=== Gmail Authentication Required ===");
        println!("Opening browser for authentication...");
        println!("If the browser doesn't open, visit: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            log::warn!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        // Step 3: Wait for callback with authorization code
        println!("Waiting for authorization...");
        let code = self.wait_for_callback(listener)?;

        // Step 4: Exchange code for tokens
        let token = self.post_token_form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
        ])?;

        println!("Authentication successful!\n");
        Ok(token)
    }

    /// POST a form to the token endpoint, classifying rejected grants
    fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        let mut response = agent
            .post(Self::TOKEN_URL)
            .send_form(form.iter().copied())
            .context("Failed to reach the OAuth token endpoint")?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .context("Failed to read token response")?;

        if !(200..300).contains(&status) {
            return Err(classify_failure(status, &body).into());
        }

        serde_json::from_str(&body).context("Failed to parse token response")
    }

    /// Start a local TCP server on an available port
    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        anyhow::bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    /// Wait for OAuth callback and extract authorization code
    fn wait_for_callback(&self, listener: TcpListener) -> Result<String> {
        let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        // Format: GET /?code=AUTH_CODE&scope=... HTTP/1.1
        let code = callback_param(&request_line, "code");
        let error = callback_param(&request_line, "error");

        let (status, body) = if code.is_some() {
            ("200 OK", "Authentication successful! You can close this window.")
        } else {
            ("400 Bad Request", "Authentication failed. Please try again.")
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        if let Some(err) = error {
            anyhow::bail!("OAuth error: {}", err);
        }

        code.context("No authorization code received")
    }

    /// Refresh an access token using a refresh token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut token = self.post_token_form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])?;

        // Preserve the refresh token if not returned
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }

    /// Load stored token from disk
    fn load_token(&self) -> Result<StoredToken> {
        let content = fs::read_to_string(&self.token_path)?;
        let token: StoredToken = serde_json::from_str(&content)?;
        Ok(token)
    }

    /// Save token response to disk
    fn save_token_response(&self, token: &TokenResponse) -> Result<()> {
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        };

        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.token_path, content)?;
        Ok(())
    }

    /// Check whether a token has been stored (it may still need a refresh)
    pub fn is_signed_in(&self) -> bool {
        self.load_token().is_ok()
    }

    /// Clear stored tokens (logout)
    pub fn logout(&self) -> Result<()> {
        if self.token_path.exists() {
            fs::remove_file(&self.token_path)?;
        }
        Ok(())
    }
}

/// Extract a query parameter from an HTTP request line
fn callback_param(request_line: &str, name: &str) -> Option<String> {
    let path = request_line.split_whitespace().nth(1)?;
    let query = path.split_once('?')?.1;
    query.split('&').find_map(|param| {
        let (key, value) = param.split_once('=')?;
        (key == name).then(|| {
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_in(dir: &tempfile::TempDir) -> GmailAuth {
        GmailAuth::with_token_path(
            "client".to_string(),
            "secret".to_string(),
            dir.path().join(GmailAuth::TOKEN_FILE),
        )
    }

    #[test]
    fn test_callback_param() {
        let line = "GET /?code=4%2F0AX4&scope=email HTTP/1.1\r\n";
        assert_eq!(callback_param(line, "code"), Some("4/0AX4".to_string()));
        assert_eq!(callback_param(line, "error"), None);

        let denied = "GET /?error=access_denied HTTP/1.1\r\n";
        assert_eq!(callback_param(denied, "error"), Some("access_denied".to_string()));
        assert_eq!(callback_param("GET / HTTP/1.1", "code"), None);
    }

    #[test]
    fn test_access_token_requires_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let auth = auth_in(&dir);
        assert!(!auth.is_signed_in());
        assert!(auth.access_token().is_err());
    }

    #[test]
    fn test_fresh_stored_token_is_used_without_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let auth = auth_in(&dir);
        auth.save_token_response(&TokenResponse {
            access_token: "ya29.fresh".to_string(),
            refresh_token: None,
            expires_in: Some(3600),
            token_type: "Bearer".to_string(),
        })
        .unwrap();

        assert!(auth.is_signed_in());
        assert_eq!(auth.access_token().unwrap().secret(), "ya29.fresh");
    }

    #[test]
    fn test_stale_token_without_refresh_is_expired() {
        let dir = tempfile::tempdir().unwrap();
        let auth = auth_in(&dir);
        auth.save_token_response(&TokenResponse {
            access_token: "ya29.stale".to_string(),
            refresh_token: None,
            expires_in: Some(0),
            token_type: "Bearer".to_string(),
        })
        .unwrap();

        let err = auth.access_token().unwrap_err();
        assert!(
            err.downcast_ref::<ProviderError>()
                .is_some_and(ProviderError::is_token_expired)
        );

        auth.logout().unwrap();
        assert!(!auth.is_signed_in());
    }

    #[test]
    fn test_access_token_debug_hides_secret() {
        let token = AccessToken::new("ya29.secret");
        assert_eq!(format!("{:?}", token), "AccessToken(***)");
    }
}
