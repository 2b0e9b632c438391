//! graphseed CLI
//!
//! Administrative commands for an application's ArangoDB database:
//! - `graphseed database create|drop` run as the administrator on `_system`
//! - `graphseed database migrate|seed|verify` run as the application user
//! - `graphseed database reset` drops, recreates, migrates and seeds
//!
//! Settings come from flags, `GRAPHSEED_*` environment variables and an
//! optional `config.yaml`; seed collections come from a YAML manifest.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;

mod commands;
mod config;
mod logging;

use commands::DatabaseCommands;
use config::{ConnectionArgs, Settings};

#[derive(Parser)]
#[command(name = "graphseed")]
#[command(
    author,
    version,
    about = "graphseed: database migrations and seed synchronization for ArangoDB"
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database management
    #[command(visible_alias = "db")]
    Database {
        #[command(subcommand)]
        command: DatabaseCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::resolve(&cli.connection)?;
    if let Some(path) = &settings.config_file {
        println!("Using config file: {}", path.display());
    }
    tracing::debug!(
        endpoint = %settings.connection.endpoint,
        database = %settings.connection.database,
        seeds = %settings.seeds.display(),
        "resolved settings"
    );

    match cli.command {
        Commands::Database { command } => commands::run_database(command, &settings),
    }
}
