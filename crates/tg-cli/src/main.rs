use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tg_cli::commands::replay::{self, ReplayOptions};
use tg_cli::commands::{settings, stats, status, tracker};
use tg_cli::{Cli, Commands, Config};
use tg_store::{MemoryStore, SqliteStore};

/// Load config and open the store, ensuring the parent directory exists.
fn open_store(config_path: Option<&Path>) -> Result<(SqliteStore, Config)> {
    let config = load_config(config_path)?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let store = SqliteStore::open(&config.database_path).context("failed to open database")?;
    Ok((store, config))
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays pipeable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let today = Local::now().date_naive();

    match &cli.command {
        Some(Commands::Status) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            status::run(&mut out, &store, &config.database_path, today).await?;
        }
        Some(Commands::Settings(args)) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            settings::run(&mut out, &store, &args.to_edit()).await?;
        }
        Some(Commands::Tracker { json }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            tracker::run(&mut out, &store, Utc::now(), *json).await?;
        }
        Some(Commands::Stats { days, json }) => {
            let (store, _config) = open_store(cli.config.as_deref())?;
            stats::run(&mut out, &store, today, *days, *json).await?;
        }
        Some(Commands::Replay {
            script,
            realtime,
            persist,
        }) => {
            let source = std::fs::read_to_string(script)
                .with_context(|| format!("failed to read script {}", script.display()))?;
            let config = load_config(cli.config.as_deref())?;
            let options = ReplayOptions {
                realtime: *realtime,
                second: config.tick_interval(),
                badge: config.badge.clone(),
                start: Utc::now(),
            };
            if *persist {
                let (store, _config) = open_store(cli.config.as_deref())?;
                replay::run(&mut out, Arc::new(store), &source, &options).await?;
            } else {
                replay::run(&mut out, Arc::new(MemoryStore::new()), &source, &options).await?;
            }
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    out.flush()?;
    Ok(())
}
