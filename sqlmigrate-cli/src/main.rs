//! Command line front end for sqlmigrate.
//!
//! `sqlmigrate create <dir> <name>` scaffolds an empty pair of scripts named after the
//! current Unix time. The other commands run migrations from a directory against a
//! SQLite database.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use sqlmigrate::sqlite::SqliteMigrator;
use sqlmigrate::{DirSource, MigrationReport};
use tracing_subscriber::EnvFilter;

static SCRIPT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)^[\w-]+$").expect("script name pattern is valid"));

#[derive(Parser)]
#[command(name = "sqlmigrate")]
#[command(about = "Apply and revert versioned SQL scripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty pair of up and down scripts
    Create {
        /// Directory to write the scripts into
        dir: PathBuf,
        /// Name appended to the timestamp, matching [\w-]+
        name: String,
    },
    /// Apply every pending up script
    Up(DatabaseArgs),
    /// Revert every applied script
    Down(DatabaseArgs),
    /// Migrate up or down to a version ("" reverts everything)
    To {
        /// Target version
        version: String,
        #[command(flatten)]
        database: DatabaseArgs,
    },
    /// Show the current version and the pending up scripts
    Status(DatabaseArgs),
}

#[derive(Args)]
struct DatabaseArgs {
    /// Path of the SQLite database file
    #[arg(long, env = "DATABASE_URL")]
    database: String,

    /// Directory holding the migration scripts
    #[arg(long, default_value = "migrations")]
    dir: PathBuf,

    /// Name of the version table
    #[arg(long, default_value = "migrations")]
    table: String,
}

impl DatabaseArgs {
    fn open(&self) -> Result<(SqliteMigrator, Connection)> {
        let migrator = SqliteMigrator::new(DirSource::new(&self.dir))
            .try_with_table_name(&self.table)?;
        let path = self
            .database
            .strip_prefix("sqlite://")
            .unwrap_or(&self.database);
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", self.database))?;
        Ok((migrator, conn))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Create { dir, name } => {
            let (up, down) = create(&dir, &name, chrono::Utc::now().timestamp())?;
            println!("created {}", up.display());
            println!("created {}", down.display());
        }
        Command::Up(database) => {
            let (migrator, mut conn) = database.open()?;
            print_report(&migrator.migrate_up(&mut conn)?);
        }
        Command::Down(database) => {
            let (migrator, mut conn) = database.open()?;
            print_report(&migrator.migrate_down(&mut conn)?);
        }
        Command::To { version, database } => {
            let (migrator, mut conn) = database.open()?;
            print_report(&migrator.migrate_to(&mut conn, &version)?);
        }
        Command::Status(database) => {
            let (migrator, mut conn) = database.open()?;
            let pending = migrator.preview_up(&mut conn)?;
            println!("current version: {}", migrator.current_version(&conn)?);
            if pending.is_empty() {
                println!("up to date");
            } else {
                println!("pending ({}):", pending.len());
                for step in pending {
                    println!("  {}", step.script.name);
                }
            }
        }
    }
    Ok(())
}

/// Write empty `{timestamp}-{name}.up.sql` and `.down.sql` files into `dir`.
fn create(dir: &Path, name: &str, timestamp: i64) -> Result<(PathBuf, PathBuf)> {
    if !SCRIPT_NAME.is_match(name) {
        bail!("invalid migration name {name:?}, must match ^[\\w-]+$");
    }

    let version = format!("{timestamp}-{name}");
    let up = dir.join(format!("{version}.up.sql"));
    let down = dir.join(format!("{version}.down.sql"));
    for path in [&up, &down] {
        fs::write(path, "").with_context(|| format!("failed to create {}", path.display()))?;
    }
    Ok((up, down))
}

fn print_report(report: &MigrationReport) {
    if report.scripts_run.is_empty() {
        println!("nothing to do, version is {}", report.to);
        return;
    }
    for script in &report.scripts_run {
        println!("applied {script}");
    }
    println!("migrated from {} to {}", report.from, report.to);
}
