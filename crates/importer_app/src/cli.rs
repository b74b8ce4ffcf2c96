use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use importer_engine::{AccountId, InboxId};

use crate::config::AppConfig;
use crate::logging::LogDestination;

#[derive(Parser, Debug)]
#[command(
    name = "contact-import",
    version,
    about = "Bulk import contacts from CSV or JSON files",
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Config file (default: ./contact_import.ron when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Session file (default: ./.contact_import_session.ron)
    #[arg(long, global = true, value_name = "PATH")]
    pub session: Option<PathBuf>,
    /// Service base URL (env: CONTACT_IMPORT_BASE_URL)
    #[arg(long, global = true, env = "CONTACT_IMPORT_BASE_URL")]
    pub base_url: Option<String>,
    /// Where log output goes
    #[arg(long, global = true, value_enum, default_value_t = LogDestination::Terminal)]
    pub log: LogDestination,
    /// Log debug details
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        /// Password (env: CONTACT_IMPORT_PASSWORD)
        #[arg(long, env = "CONTACT_IMPORT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// List the accounts of the signed-in user
    Accounts,
    /// List the inboxes of an account
    Inboxes {
        #[arg(long)]
        account: Option<AccountId>,
    },
    /// Create a website inbox
    CreateInbox {
        #[arg(long)]
        account: Option<AccountId>,
        name: String,
    },
    /// Show the proposed column mapping of a file
    Map {
        file: PathBuf,
        /// Save the mapping as JSON for `import --mapping`
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import contacts
    Import(ImportArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
    #[arg(long)]
    pub account: Option<AccountId>,
    #[arg(long)]
    pub inbox: Option<InboxId>,
    /// Mapping JSON used for every file instead of the automatic mapping
    #[arg(long, value_name = "PATH")]
    pub mapping: Option<PathBuf>,
    /// Error report path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
    #[arg(long)]
    pub max_concurrent_rows: Option<usize>,
    #[arg(long)]
    pub row_delay_ms: Option<u64>,
    #[arg(long)]
    pub call_timeout_secs: Option<u64>,
}

impl Cli {
    /// Applies command line overrides on top of the file config.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Command::Import(args) = &self.command {
            if let Some(report) = &args.report {
                config.report_path = report.clone();
            }
            if let Some(rows) = args.max_concurrent_rows {
                config.max_concurrent_rows = rows;
            }
            if let Some(delay) = args.row_delay_ms {
                config.row_delay_ms = delay;
            }
            if let Some(timeout) = args.call_timeout_secs {
                config.call_timeout_secs = timeout;
            }
        }
    }
}
