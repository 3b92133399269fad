use anyhow::Context;
use clap::Parser;
use config::load_config;
use ledger::Ledger;
use shell::{execute, run_shell, ShellCommand};
use std::io::Write;
use std::path::PathBuf;
use store::Store;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod data;
mod ledger;
mod shell;
mod statement;
mod store;
mod write;

#[derive(Parser, Debug)]
#[command(
    name = "bank",
    version,
    about = "Record deposits and withdrawals, print bank statements"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database file, or ":memory:" for a throwaway session (overrides
    /// the configuration)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Drop all tables and reseed before running
    #[arg(long)]
    reset: bool,

    /// Run a single command instead of the interactive shell
    #[command(subcommand)]
    command: Option<ShellCommand>,
}

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    config.reset_on_start |= cli.reset;

    let mut store = if config.database.as_os_str() == ":memory:" {
        Store::in_memory()
    } else {
        Store::open(&config.database)
    }
    .with_context(|| format!("open {}", config.database.display()))?;
    if config.reset_on_start {
        store.reset()?;
    }
    let added = store.seed_clients(config.seed_clients.as_slice())?;
    info!(added, database = %config.database.display(), "store ready");

    let ledger = Ledger::new(store);
    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Some(command) => {
            execute(&ledger, command, &mut stdout)?;
        }
        None => {
            writeln!(stdout, "Service started!")?;
            run_shell(&ledger, std::io::stdin().lock(), stdout)?;
        }
    }
    Ok(())
}
