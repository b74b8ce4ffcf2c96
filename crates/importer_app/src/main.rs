mod cli;
mod commands;
mod config;
mod logging;
mod progress;
mod session;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use importer_logging::{import_error, import_warn};
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command};
use crate::commands::AppContext;
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::initialize(cli.log, cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            import_error!("{:#}", err);
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    let ctx = AppContext {
        config,
        session_path: cli
            .session
            .clone()
            .unwrap_or_else(|| PathBuf::from(session::DEFAULT_SESSION_FILE)),
    };

    match &cli.command {
        Command::Login { email, password } => commands::login(&ctx, email, password).await,
        Command::Logout => commands::logout(&ctx),
        Command::Accounts => commands::accounts(&ctx),
        Command::Inboxes { account } => commands::inboxes(&ctx, *account).await,
        Command::CreateInbox { account, name } => {
            commands::create_inbox(&ctx, *account, name).await
        }
        Command::Map { file, output } => commands::map(file, output.as_deref()),
        Command::Import(args) => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    import_warn!("Interrupted; finishing rows already started");
                    on_interrupt.cancel();
                }
            });
            commands::import(&ctx, args, cancel).await
        }
    }
}
