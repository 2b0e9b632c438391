//! `graphseed database` commands.

use crate::config::Settings;
use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use graphseed_seed::{SeedManager, SeedManifest, SeedRegistry, SeedSet, SyncSummary};
use graphseed_store::{ArangoHttpClient, Credentials, HttpOptions, QueryExecutor};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum DatabaseCommands {
    /// Creates the app database
    Create,
    /// Creates the app collections in the database
    Migrate,
    /// Drops the app database
    Drop,
    /// Synchronizes the local and distant seeds
    Seed,
    /// Checks that every seed record is present in the database
    Verify,
    /// Alias for drop, create, migrate, seed
    Reset,
}

impl DatabaseCommands {
    /// Whether the command needs the seed manifest.
    pub fn needs_seeds(self) -> bool {
        !matches!(self, Self::Create | Self::Drop)
    }
}

/// Run `command` against the configured server.
pub fn run_database(command: DatabaseCommands, settings: &Settings) -> Result<()> {
    let seeds = if command.needs_seeds() {
        SeedManifest::from_path(&settings.seeds)?
            .into_registry()
            .with_context(|| format!("invalid seed manifest {}", settings.seeds.display()))?
    } else {
        SeedRegistry::new()
    };

    let connection = &settings.connection;
    let client = ArangoHttpClient::new(
        &connection.endpoint,
        &connection.database,
        connection.credentials(),
        HttpOptions {
            timeout: settings.timeout,
            ..HttpOptions::default()
        },
    )
    .with_context(|| format!("cannot connect to {}", connection.endpoint))?;

    let mut manager = SeedManager::new(client, seeds, connection.clone());
    let stdout = std::io::stdout();
    execute(command, &mut manager, &settings.admin, &mut stdout.lock())
}

/// Run `command` on `manager`, printing progress to `out`.
///
/// Stops at the first failing step; `reset` runs drop, create, migrate and
/// seed in that order.
pub fn execute<E, S, W>(
    command: DatabaseCommands,
    manager: &mut SeedManager<E, S>,
    admin: &Credentials,
    out: &mut W,
) -> Result<()>
where
    E: QueryExecutor,
    S: SeedSet,
    W: Write,
{
    let start = match command {
        DatabaseCommands::Create => "Creating database...",
        DatabaseCommands::Migrate => "Migrating database...",
        DatabaseCommands::Drop => "Dropping database...",
        DatabaseCommands::Seed => "Seeding database...",
        DatabaseCommands::Verify => "Verifying seeds...",
        DatabaseCommands::Reset => "Resetting database...",
    };
    writeln!(out, "{}", start.bold())?;

    match command {
        DatabaseCommands::Create => {
            manager.create(admin)?;
        }
        DatabaseCommands::Migrate => {
            manager.migrate()?;
        }
        DatabaseCommands::Drop => manager.drop_database(admin)?,
        DatabaseCommands::Seed => {
            let summary = manager.sync_seeds()?;
            report(out, &summary)?;
        }
        DatabaseCommands::Verify => {
            let summary = manager.load_distant_seed()?;
            report(out, &summary)?;
        }
        DatabaseCommands::Reset => {
            manager.drop_database(admin)?;
            manager.create(admin)?;
            manager.migrate()?;
            let summary = manager.sync_seeds()?;
            report(out, &summary)?;
        }
    }

    writeln!(out, "{}", "Done.".green().bold())?;
    Ok(())
}

fn report<W: Write>(out: &mut W, summary: &SyncSummary) -> Result<()> {
    for collection in &summary.collections {
        writeln!(
            out,
            "  {} {}/{} records present ({} declared)",
            collection.name.bold(),
            collection.mirrored,
            collection.eligible,
            collection.declared
        )?;
    }
    Ok(())
}
