use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wt_cli::commands::{classify, identity, report, rules, run, status};
use wt_cli::{Cli, Commands, Config, IdentityAction, RulesAction};
use wt_sync::HttpCollector;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(wt_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = wt_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support. Stdout carries the host
    // protocol, so logs go to stderr.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Run) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            runtime()?.block_on(run::run(&config, db))?;
        }
        Some(Commands::Status { json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(
                &mut std::io::stdout().lock(),
                &db,
                &config.database_path,
                *json,
            )?;
        }
        Some(Commands::Rules(action)) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let mut out = std::io::stdout().lock();
            match action {
                RulesAction::Show { json } => rules::show(&mut out, &db, *json)?,
                RulesAction::Set {
                    productive,
                    unproductive,
                } => rules::set(&mut out, &db, productive, unproductive)?,
            }
        }
        Some(Commands::Identity(action)) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let mut out = std::io::stdout().lock();
            match action {
                IdentityAction::Show => identity::show(&mut out, &db)?,
                IdentityAction::Set { identity: token } => identity::set(&mut out, &db, token)?,
            }
        }
        Some(Commands::Classify { url }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            classify::run(&mut std::io::stdout().lock(), &db.rules()?, url)?;
        }
        Some(Commands::Report { json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let identity = db
                .identity()?
                .context("no identity set; run `wt identity set <token>` first")?;
            let collector =
                HttpCollector::new(&config.collector_url, config.timings().delivery_timeout)
                    .context("invalid collector configuration")?;
            runtime()?.block_on(report::run(
                &mut std::io::stdout().lock(),
                &collector,
                &identity,
                *json,
            ))?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
