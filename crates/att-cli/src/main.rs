use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use att_cli::commands::{correct, import, shifts, status};
use att_cli::{Cli, Commands, Config};
use att_db::Database;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays machine-readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();
    let now = Utc::now();

    match &cli.command {
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut stdout, &db, &config.database_path)?;
        }
        Some(Commands::Import) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let stats = import::run(io::stdin().lock(), &mut db)?;
            eprintln!(
                "Imported {} punches, {} breaks, {} employees",
                stats.punches, stats.breaks, stats.employees
            );
        }
        Some(Commands::Shifts(args)) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            match config.fixed_offset()? {
                Some(offset) => shifts::run(&mut stdout, &db, args, &config, now, &offset)?,
                None => shifts::run(&mut stdout, &db, args, &config, now, &Local)?,
            }
        }
        Some(Commands::CorrectExit(args)) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            match config.fixed_offset()? {
                Some(offset) => correct::run(&mut stdout, &mut db, args, &config, now, &offset)?,
                None => correct::run(&mut stdout, &mut db, args, &config, now, &Local)?,
            }
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    stdout.flush()?;
    Ok(())
}
