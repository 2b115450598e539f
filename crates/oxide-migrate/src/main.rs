//! oxide-migrate CLI
//!
//! Command-line tool for applying schema migrations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_migrate::config::DEFAULT_MIGRATIONS_DIR;
use oxide_migrate::prelude::*;

/// Ledger-tracked schema migrations.
#[derive(Parser)]
#[command(name = "oxide-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (`sqlite:`, `postgres://` or `mysql://`).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Migrations directory.
    #[arg(short, long, default_value = DEFAULT_MIGRATIONS_DIR)]
    migrations_dir: PathBuf,

    /// Ledger file (defaults to `.ledger.json` in the migrations directory).
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// SQL dialect (inferred from the database URL if not specified).
    #[arg(long, value_enum)]
    dialect: Option<DialectArg>,

    /// Give up waiting for the ledger lock after this many milliseconds.
    #[arg(long, default_value_t = 10_000)]
    lock_timeout_ms: u64,

    /// Treat a ledger lock older than this many seconds as abandoned.
    #[arg(long, default_value_t = 300)]
    stale_lock_secs: u64,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Postgres,
    Mysql,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Self::Postgres,
            DialectArg::Mysql => Self::MySql,
            DialectArg::Sqlite => Self::Sqlite,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations as one batch.
    Up {
        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Roll back the last batch.
    Down {
        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Show migration status.
    Status,

    /// Check that applied migrations are present and unmodified.
    Verify,

    /// Create a new migration file.
    Create {
        /// Migration name/description.
        name: String,
    },

    /// Print the SQL for one migration file.
    Sql {
        /// Path to the migration file.
        file: PathBuf,

        /// Show rollback SQL instead of forward SQL.
        #[arg(short, long)]
        revert: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let dialect = match cli.dialect {
        Some(arg) => Dialect::from(arg),
        None => dialect_from_url(&cli.database).with_context(|| {
            format!(
                "cannot infer the SQL dialect from '{}', pass --dialect",
                cli.database
            )
        })?,
    };

    let mut config = RunnerConfig::new(&cli.migrations_dir, dialect).lock_policy(LockPolicy {
        timeout: Duration::from_millis(cli.lock_timeout_ms),
        stale_after: Duration::from_secs(cli.stale_lock_secs),
        ..LockPolicy::default()
    });
    if let Some(ledger) = &cli.ledger {
        config = config.ledger_path(ledger);
    }

    let clock = Arc::new(SystemClock);
    let adapter = SqlxAdapter::new(cli.database.as_str());
    let mut runner = MigrationRunner::from_config(&config, adapter, clock.clone());

    match cli.command {
        Commands::Up { dry_run: true } => {
            info!("Dry run mode - SQL will be printed but not executed.");
            print_plan(&runner.plan_up().await?);
        }

        Commands::Up { dry_run: false } => {
            let report = runner.up().await?;
            match report.batch {
                Some(batch) => {
                    for file in &report.applied {
                        info!("Applied {file}");
                    }
                    info!(
                        "Applied {} migration(s) in batch {batch}.",
                        report.applied.len()
                    );
                }
                None => info!("Nothing to migrate."),
            }
        }

        Commands::Down { dry_run: true } => {
            info!("Dry run mode - SQL will be printed but not executed.");
            print_plan(&runner.plan_down().await?);
        }

        Commands::Down { dry_run: false } => {
            let report = runner.down().await?;
            match report.batch {
                Some(batch) => {
                    for file in &report.rolled_back {
                        info!("Rolled back {file}");
                    }
                    info!("Rolled back batch {batch}.");
                }
                None => info!("Nothing to roll back."),
            }
        }

        Commands::Status => {
            let statuses = runner.status().await?;

            if statuses.is_empty() {
                info!("No migrations found in {}.", config.migrations_dir.display());
            } else {
                println!("\nMigrations:");
                println!("{:-<60}", "");

                for status in &statuses {
                    let marker = match status.state {
                        MigrationState::Applied => "[X]",
                        MigrationState::Pending => "[ ]",
                        MigrationState::Modified => "[!]",
                        MigrationState::Missing => "[?]",
                    };
                    match (status.batch, status.applied_at) {
                        (Some(batch), Some(applied_at)) => println!(
                            " {marker} {} (batch {batch}, {})",
                            status.filename,
                            applied_at.format("%Y-%m-%d %H:%M:%S")
                        ),
                        _ => println!(" {marker} {}", status.filename),
                    }
                }
                println!();
            }
        }

        Commands::Verify => {
            let count = runner.verify().await?;
            info!("{count} applied migration(s) verified.");
        }

        Commands::Create { name } => {
            let path = create_migration_file(
                &config.migrations_dir,
                clock.as_ref(),
                &name,
                &config.extension,
            )
            .await?;
            println!("{}", path.display());
        }

        Commands::Sql { file, revert } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("cannot read '{}'", file.display()))?;
            let direction = if revert {
                Direction::Revert
            } else {
                Direction::Apply
            };
            let name = file.display().to_string();
            for sql in compile(dialect, &name, &content, direction)? {
                println!("{sql};");
            }
        }
    }

    Ok(())
}

fn print_plan(plan: &[PlannedMigration]) {
    if plan.is_empty() {
        info!("Nothing to do.");
        return;
    }
    for migration in plan {
        println!("-- {}", migration.filename);
        for sql in &migration.statements {
            println!("{sql};");
        }
        println!();
    }
}
