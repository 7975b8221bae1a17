//! Facturas - retrieve invoice attachments from Gmail
//!
//! Searches a Gmail mailbox for messages carrying invoice attachments and
//! bundles the selected ones into a ZIP archive, renaming DTE documents
//! after their generation code.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use invoices::{ProviderError, search::ALL_FILE_TYPES};
use log::error;

mod commands;

#[derive(Parser)]
#[command(name = "facturas", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in to Gmail (opens a browser)
    Login,
    /// Forget the stored Gmail tokens
    Logout,
    /// Search the mailbox for invoice messages
    Search {
        #[command(flatten)]
        filters: SearchArgs,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Save the results to FILE for a later `download --selection`
        #[arg(long, value_name = "FILE")]
        save: Option<PathBuf>,
    },
    /// Download attachments of matching messages into a ZIP archive
    Download {
        #[command(flatten)]
        filters: SearchArgs,

        /// Use results saved by `search --save` instead of searching again
        #[arg(long, value_name = "FILE")]
        selection: Option<PathBuf>,

        /// Only download these message IDs (repeatable)
        #[arg(long = "only", value_name = "ID")]
        only: Vec<String>,

        /// Where to write the archive
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// List previously downloaded attachments
    History {
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Filters shared by `search` and `download`
#[derive(Args, Clone, Debug)]
struct SearchArgs {
    /// Free-text term to search for
    #[arg(short, long, default_value = "")]
    term: String,

    /// Earliest date, inclusive (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    from: Option<String>,

    /// Latest date, inclusive (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    to: Option<String>,

    /// Attachment type: pdf, xml, json or all
    #[arg(long = "type", value_name = "TYPE", default_value = ALL_FILE_TYPES)]
    file_type: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let result = match cli.command {
        Command::Login => commands::login(),
        Command::Logout => commands::logout(),
        Command::Search {
            filters,
            json,
            save,
        } => commands::search(&filters.into(), json, save.as_deref()),
        Command::Download {
            filters,
            selection,
            only,
            output,
        } => commands::download(&filters.into(), selection.as_deref(), &only, output),
        Command::History { json } => commands::history(json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            if e
                .downcast_ref::<ProviderError>()
                .is_some_and(ProviderError::is_token_expired)
            {
                eprintln!("Your Gmail session has expired. Run `facturas login` to sign in again.");
            }
            ExitCode::FAILURE
        }
    }
}

impl From<SearchArgs> for invoices::SearchQuery {
    fn from(args: SearchArgs) -> Self {
        invoices::SearchQuery::new(args.term)
            .between(args.from, args.to)
            .file_type(args.file_type)
    }
}
