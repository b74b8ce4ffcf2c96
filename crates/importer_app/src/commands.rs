use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use importer_core::{auto_map, missing_required, scalar_text, FieldMapping, MappingTarget};
use importer_engine::{
    parse_file, run_import, write_atomic, write_error_report, AccountId, ContactApi, ImportFile,
    ImportJob, ImportTarget, Inbox, ReqwestContactApi,
};
use importer_logging::{import_info, import_warn};
use tokio_util::sync::CancellationToken;

use crate::cli::ImportArgs;
use crate::config::AppConfig;
use crate::progress::{summary_line, TerminalProgress};
use crate::session::{self, StoredSession};

const NO_INBOX: &str =
    "You must create at least one inbox in your account before using the import service.";

pub struct AppContext {
    pub config: AppConfig,
    pub session_path: PathBuf,
}

impl AppContext {
    fn client(&self, session: &StoredSession) -> Result<ReqwestContactApi> {
        ReqwestContactApi::new(self.config.api_settings(), &session.tokens)
            .context("building API client")
    }
}

pub async fn login(ctx: &AppContext, email: &str, password: &str) -> Result<()> {
    let login = importer_engine::login(&ctx.config.api_settings(), email, password)
        .await
        .context("Login failed")?;
    if login.accounts.is_empty() {
        bail!("Your login must be associated with at least one account to use the import service.");
    }

    let stored = StoredSession::new(login, Utc::now());
    session::save(&ctx.session_path, &stored)?;
    println!("Signed in as {} <{}>", stored.user.name, stored.user.email);
    print_accounts(&stored);
    Ok(())
}

pub fn logout(ctx: &AppContext) -> Result<()> {
    if session::clear(&ctx.session_path)? {
        println!("Signed out.");
    } else {
        println!("No session to sign out of.");
    }
    Ok(())
}

pub fn accounts(ctx: &AppContext) -> Result<()> {
    let stored = session::load(&ctx.session_path)?;
    print_accounts(&stored);
    Ok(())
}

fn print_accounts(stored: &StoredSession) {
    for account in &stored.accounts {
        match &account.role {
            Some(role) => println!("{:>8}  {} ({})", account.id, account.name, role),
            None => println!("{:>8}  {}", account.id, account.name),
        }
    }
}

pub async fn inboxes(ctx: &AppContext, account: Option<AccountId>) -> Result<()> {
    let stored = session::load(&ctx.session_path)?;
    let account = stored.account(account)?;
    let inboxes = ctx
        .client(&stored)?
        .list_inboxes(account.id)
        .await
        .context("listing inboxes")?;
    if inboxes.is_empty() {
        println!("{NO_INBOX}");
    }
    for inbox in &inboxes {
        println!(
            "{:>8}  {}  {}",
            inbox.id,
            inbox.name,
            inbox.channel_type.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub async fn create_inbox(ctx: &AppContext, account: Option<AccountId>, name: &str) -> Result<()> {
    let stored = session::load(&ctx.session_path)?;
    let account = stored.account(account)?;
    let inbox = ctx
        .client(&stored)?
        .create_inbox(account.id, name)
        .await
        .context("creating inbox")?;
    println!("Created inbox {} ({})", inbox.name, inbox.id);
    Ok(())
}

pub fn map(file: &Path, output: Option<&Path>) -> Result<()> {
    let parsed = parse_file(file).with_context(|| format!("reading {}", file.display()))?;
    let mappings = auto_map(&parsed.headers);
    let first = parsed.rows.first();

    for mapping in &mappings {
        let target = Option::<String>::from(mapping.target).unwrap_or_else(|| "-".to_string());
        let sample = first
            .and_then(|row| row.get(&mapping.source))
            .map(scalar_text)
            .unwrap_or_default();
        println!("{:<24} -> {:<14} {}", mapping.source, target, sample);
    }
    if let Some(message) = required_mapping_error(&mappings) {
        println!("{message}");
    }

    if let Some(output) = output {
        let json = serde_json::to_string_pretty(&mappings).context("serializing mapping")?;
        write_atomic(output, json.as_bytes())
            .with_context(|| format!("writing {}", output.display()))?;
        println!("Mapping saved to {}", output.display());
    }
    Ok(())
}

pub async fn import(ctx: &AppContext, args: &ImportArgs, cancel: CancellationToken) -> Result<()> {
    let stored = session::load(&ctx.session_path)?;
    let account = stored.account(args.account)?;
    let api = Arc::new(ctx.client(&stored)?);
    let inbox_id = match args.inbox {
        Some(id) => id,
        None => {
            let inboxes = api
                .list_inboxes(account.id)
                .await
                .context("listing inboxes")?;
            pick_inbox(&inboxes)?.id
        }
    };

    let saved = match &args.mapping {
        Some(path) => Some(load_mapping(path)?),
        None => None,
    };
    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let parsed = parse_file(path).with_context(|| format!("reading {}", path.display()))?;
        let mappings = mappings_for(&parsed.headers, saved.as_deref());
        if let Some(message) = required_mapping_error(&mappings) {
            bail!("{}: {message}", parsed.name);
        }
        files.push(ImportFile {
            name: parsed.name,
            mappings,
            rows: parsed.rows,
        });
    }

    let job = ImportJob {
        target: ImportTarget {
            account_id: account.id,
            inbox_id,
        },
        files,
    };
    let summary = run_import(
        api,
        job,
        ctx.config.runner_settings(),
        cancel,
        &TerminalProgress::stderr(),
    )
    .await;

    println!("{}", summary_line(summary.success_count, summary.errors.len()));
    if summary.partial_rows() > 0 {
        println!(
            "{} contacts were created without all of their labels.",
            summary.partial_rows()
        );
    }
    if summary.cancelled {
        println!(
            "Import cancelled after {} of {} rows.",
            summary.processed_rows, summary.total_rows
        );
    }
    if !summary.errors.is_empty() {
        let report = &ctx.config.report_path;
        match write_error_report(report, &summary.errors) {
            Ok(()) => println!("Error report written to {}", report.display()),
            Err(err) => import_warn!("Could not write error report {}: {}", report.display(), err),
        }
    }
    import_info!("Import of {} rows done", summary.total_rows);
    Ok(())
}

fn pick_inbox(inboxes: &[Inbox]) -> Result<&Inbox> {
    match inboxes {
        [] => bail!(NO_INBOX),
        [only] => Ok(only),
        _ => bail!("Several inboxes are available; choose one with --inbox"),
    }
}

fn load_mapping(path: &Path) -> Result<Vec<FieldMapping>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading mapping {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing mapping {}", path.display()))
}

/// Uses the saved mapping for known columns and ignores the rest; without a
/// saved mapping every column is mapped automatically.
fn mappings_for(headers: &[String], saved: Option<&[FieldMapping]>) -> Vec<FieldMapping> {
    let Some(saved) = saved else {
        return auto_map(headers);
    };
    headers
        .iter()
        .map(|header| {
            let target = saved
                .iter()
                .find(|mapping| mapping.source == *header)
                .map_or(MappingTarget::Ignore, |mapping| mapping.target);
            FieldMapping::new(header.as_str(), target)
        })
        .collect()
}

fn required_mapping_error(mappings: &[FieldMapping]) -> Option<String> {
    let missing = missing_required(mappings);
    if missing.is_empty() {
        return None;
    }
    let labels: Vec<&str> = missing.iter().map(|field| field.label).collect();
    Some(format!(
        "Please map the following required fields: {}",
        labels.join(", ")
    ))
}
