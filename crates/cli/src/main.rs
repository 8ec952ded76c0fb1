//! Repository migration orchestration kernel — command-line front end.
//!
//! Thin `clap` dispatch over `migrator_cli::commands`; all real logic lives
//! in the library so it can be exercised without going through argument
//! parsing.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::{Parser, Subcommand};
use migrator_cli::commands::{batch, migrate, repo, serve};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ghmigrator")]
#[command(about = "Bulk repository migration orchestration kernel")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to ~/.ghmigrator/config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dispatcher, poll loop, and supervisor until shutdown
    Serve,
    /// Print a rollup of setup, discovery, and repository status counts
    Migrate {
        #[command(subcommand)]
        command: MigrateCommands,
    },
    /// Batch lifecycle operations
    Batch {
        #[command(subcommand)]
        command: BatchCommands,
    },
    /// Per-repository state-transition operations
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Show current migration progress
    Status,
}

#[derive(Subcommand)]
enum BatchCommands {
    /// Create a new batch
    Create {
        name: String,
        #[arg(long, default_value = "standard")]
        batch_type: String,
        #[arg(long, default_value = "gei")]
        migration_api: String,
        #[arg(long)]
        destination_org: Option<String>,
    },
    /// Add repositories to a batch
    Add {
        batch_id: i64,
        #[arg(required = true)]
        repository_ids: Vec<i64>,
    },
    /// Remove repositories from a batch
    Remove {
        batch_id: i64,
        #[arg(required = true)]
        repository_ids: Vec<i64>,
    },
    /// Start a batch's migration (or dry run)
    Start {
        batch_id: i64,
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete a pending batch
    Delete { batch_id: i64 },
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Show a repository's current state, history, and dependencies
    Show { full_name: String },
    /// Reset a failed/rolled-back/won't-migrate repository to `pending`
    Reset {
        full_name: String,
        #[arg(long)]
        initiated_by: Option<String>,
    },
    /// Mark a repository as won't-migrate
    WontMigrate {
        full_name: String,
        #[arg(long)]
        initiated_by: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve => serve::run(config_path).await,
        Commands::Migrate {
            command: MigrateCommands::Status,
        } => migrate::status(config_path).await,
        Commands::Batch { command } => match command {
            BatchCommands::Create {
                name,
                batch_type,
                migration_api,
                destination_org,
            } => batch::create(config_path, name, batch_type, migration_api, destination_org).await,
            BatchCommands::Add {
                batch_id,
                repository_ids,
            } => batch::add(config_path, batch_id, repository_ids).await,
            BatchCommands::Remove {
                batch_id,
                repository_ids,
            } => batch::remove(config_path, batch_id, repository_ids).await,
            BatchCommands::Start { batch_id, dry_run } => batch::start(config_path, batch_id, dry_run).await,
            BatchCommands::Delete { batch_id } => batch::delete(config_path, batch_id).await,
        },
        Commands::Repo { command } => match command {
            RepoCommands::Show { full_name } => repo::show(config_path, full_name).await,
            RepoCommands::Reset {
                full_name,
                initiated_by,
            } => repo::reset(config_path, full_name, initiated_by).await,
            RepoCommands::WontMigrate {
                full_name,
                initiated_by,
            } => repo::wont_migrate(config_path, full_name, initiated_by).await,
        },
    }
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("ghmigrator={level},{}={level}", env!("CARGO_PKG_NAME")))
        .init();
    Ok(())
}
