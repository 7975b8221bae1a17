//! Subcommand implementations

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use invoices::{
    ARCHIVE_FILENAME, GmailAuth, GmailClient, GmailCredentials, HistoryStore, METADATA_HEADER,
    MailProvider, MessageSummary, SearchQuery, SelectedMessage, Settings, assemble_archive,
    history_rows, search_invoices,
};

/// A search result as printed by `search --json`
#[derive(Serialize)]
struct SearchHit<'a> {
    #[serde(flatten)]
    summary: &'a MessageSummary,
    downloaded: bool,
}

fn auth() -> Result<GmailAuth> {
    let creds = GmailCredentials::load().inspect_err(|_| {
        if let Some(path) = GmailCredentials::default_credentials_path() {
            warn!(
                "To configure Gmail access, either:\n\
                 1. Place your Google OAuth credentials at: {}\n\
                 2. Or set environment variables: GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                path.display()
            );
        }
    })?;
    GmailAuth::new(creds.client_id, creds.client_secret)
}

/// Gmail client for the signed-in user
fn connect() -> Result<GmailClient> {
    let token = auth()?.access_token()?;
    Ok(GmailClient::new(token))
}

/// History store per settings; failures are logged and treated as "no history"
fn open_history(settings: &Settings) -> Option<Box<dyn HistoryStore>> {
    match settings.open_history_store() {
        Ok(store) => store,
        Err(e) => {
            warn!("History unavailable: {:#}", e);
            None
        }
    }
}

pub fn login() -> Result<()> {
    let token = auth()?.sign_in()?;
    let email = GmailClient::new(token).profile_email()?;
    println!("Signed in as {}", email);
    Ok(())
}

pub fn logout() -> Result<()> {
    let auth = auth()?;
    if !auth.is_signed_in() {
        println!("Not signed in");
        return Ok(());
    }
    auth.logout()?;
    println!("Signed out");
    Ok(())
}

pub fn search(query: &SearchQuery, json: bool, save: Option<&Path>) -> Result<()> {
    let client = connect()?;
    let summaries = search_invoices(&client, query)?;

    let downloaded = match Settings::load() {
        Ok(settings) => downloaded_ids(&client, &settings),
        Err(e) => {
            warn!("Could not load settings: {:#}", e);
            HashSet::new()
        }
    };

    if let Some(path) = save {
        config::save_json_file(path, &summaries)
            .with_context(|| format!("Failed to save results to {}", path.display()))?;
        info!("Saved {} results to {}", summaries.len(), path.display());
    }

    if json {
        let hits: Vec<SearchHit> = summaries
            .iter()
            .map(|summary| SearchHit {
                summary,
                downloaded: downloaded.contains(summary.id.as_str()),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No invoice messages found");
        return Ok(());
    }

    for summary in &summaries {
        let marker = if downloaded.contains(summary.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}  {:<16}  {}",
            marker, summary.id, summary.date, summary.subject
        );
        println!("    from: {}", summary.from);
        for attachment in &summary.attachments {
            println!("    - {}", attachment.filename);
        }
    }
    if !downloaded.is_empty() {
        println!("\n* already downloaded");
    }
    Ok(())
}

pub fn download(
    query: &SearchQuery,
    selection: Option<&Path>,
    only: &[String],
    output: Option<PathBuf>,
) -> Result<()> {
    let client = connect()?;

    let summaries: Vec<MessageSummary> = match selection {
        Some(path) => config::load_json_file(path)?,
        None => search_invoices(&client, query)?,
    };

    let selections = select(&summaries, only);
    if selections.is_empty() {
        bail!("No messages selected for download");
    }

    let result = assemble_archive(&client, &selections)?;

    let output = output.unwrap_or_else(|| PathBuf::from(ARCHIVE_FILENAME));
    std::fs::write(&output, &result.archive)
        .with_context(|| format!("Failed to write archive to {}", output.display()))?;

    for entry in &result.entries {
        println!("  {}", entry);
    }
    println!(
        "Wrote {} entries to {} ({} failed)",
        result.entries.len(),
        output.display(),
        result.failed_entries()
    );
    println!("{}: {}", METADATA_HEADER, result.metadata_header_value()?);

    record_history(&client, &summaries, &selections, &result.metadata);
    Ok(())
}

pub fn history(json: bool) -> Result<()> {
    let settings = Settings::load()?;
    let Some(store) = settings.open_history_store()? else {
        bail!("Download history is turned off in settings");
    };

    let email = connect()?.profile_email()?;
    let rows = store.list_history(&email)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No downloads recorded for {}", email);
        return Ok(());
    }

    for row in &rows {
        let when = if row.downloaded_at == DateTime::<Utc>::UNIX_EPOCH {
            "-".to_string()
        } else {
            row.downloaded_at.format("%Y-%m-%d %H:%M").to_string()
        };
        println!(
            "{:<16}  {:<40}  {}",
            when,
            row.filename,
            row.generation_code.as_deref().unwrap_or("-")
        );
        println!("    {} ({})", row.subject, row.sender);
    }
    Ok(())
}

/// Selections for the requested message IDs, or for every summary
fn select(summaries: &[MessageSummary], only: &[String]) -> Vec<SelectedMessage> {
    summaries
        .iter()
        .filter(|s| only.is_empty() || only.iter().any(|id| id == s.id.as_str()))
        .map(SelectedMessage::from)
        .collect()
}

fn downloaded_ids(client: &dyn MailProvider, settings: &Settings) -> HashSet<String> {
    let Some(store) = open_history(settings) else {
        return HashSet::new();
    };

    client
        .profile_email()
        .map_err(anyhow::Error::from)
        .and_then(|email| store.downloaded_message_ids(&email))
        .unwrap_or_else(|e| {
            warn!("Could not read download history: {:#}", e);
            HashSet::new()
        })
}

/// Record the download; never fails the command
fn record_history(
    client: &dyn MailProvider,
    summaries: &[MessageSummary],
    selections: &[SelectedMessage],
    metadata: &[invoices::TaxDocumentMetadata],
) {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Skipping history: {:#}", e);
            return;
        }
    };
    let Some(store) = open_history(&settings) else {
        return;
    };

    let email = match client.profile_email() {
        Ok(email) => email,
        Err(e) => {
            warn!("Skipping history, could not read Gmail profile: {}", e);
            return;
        }
    };

    let rows = history_rows(&email, summaries, selections, metadata, Utc::now());
    match store.save_history(&rows) {
        Ok(()) => info!("Recorded {} downloads for {}", rows.len(), email),
        Err(e) => warn!("Failed to record download history: {:#}", e),
    }
}
