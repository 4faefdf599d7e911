//! AstroSync CLI - offline store and sync queue management
//!
//! Usage: astrosync <command> [options]

mod app;
mod commands;

use app::App;
use astro_common::{EXIT_CONFIG_ERROR, EXIT_ERROR};
use astro_config::Config;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "astrosync",
    version,
    about = "AstroSync offline storage and sync engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Treat the network as unavailable
    #[arg(long, global = true)]
    offline: bool,

    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true, env = "ASTROSYNC_WORKSPACE")]
    workspace: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new AstroSync workspace
    Init,

    /// Show queue and connectivity status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Queue a mutation for sync
    Enqueue {
        /// Target url, absolute or relative to the API base
        url: String,

        /// HTTP method: GET, POST, PUT, DELETE, PATCH
        #[arg(short, long, default_value = "POST")]
        method: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,

        /// Priority: critical, high, medium, low (defaults to the strategy's)
        #[arg(short, long)]
        priority: Option<String>,

        /// Strategy: immediate, batch, background
        #[arg(short, long, default_value = "batch")]
        strategy: String,

        /// Queue item ids that must sync first (comma-separated)
        #[arg(long, value_delimiter = ',')]
        depends_on: Option<Vec<String>>,

        /// Data type used to pick a conflict handler
        #[arg(long)]
        data_type: Option<String>,
    },

    /// Run a sync pass
    Sync {
        #[arg(value_enum, default_value = "all")]
        target: SyncTarget,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop every queued mutation
    ClearQueue,

    /// Manage cached values
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Remove expired records from every partition
    Cleanup,

    /// Show record counts per partition
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a JSON backup of every partition
    Export { path: PathBuf },

    /// Restore records from a JSON backup
    Import { path: PathBuf },

    /// Keep syncing in the foreground until Ctrl-C
    Run,
}

#[derive(Clone, Copy, ValueEnum)]
enum SyncTarget {
    Immediate,
    Batch,
    Background,
    All,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Store a value (JSON, or taken as a plain string)
    Put {
        key: String,
        value: String,

        /// Time to live in milliseconds
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Print a cached value
    Get { key: String },

    /// Remove a cached value
    Delete { key: String },

    /// Remove every cached value
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let root = match cli.workspace.clone() {
        Some(root) => root,
        None => match std::env::current_dir() {
            Ok(cwd) => cwd,
            Err(e) => {
                eprintln!("Error: cannot read current directory: {}", e);
                std::process::exit(EXIT_ERROR);
            }
        },
    };

    let config = match Config::load(&root) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    astro_common::telemetry::init_tracing(
        cli.verbose || config.logging.verbose,
        cli.json_logs || config.logging.json,
    );
    tracing::debug!("AstroSync CLI started in {:?}", root);

    let app = match App::open(config, cli.offline) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_ERROR);
        }
    };

    let result = match cli.command {
        Commands::Init => commands::cmd_init(&app.config.root),
        Commands::Status { json } => commands::sync::cmd_status(&app, json),
        Commands::Enqueue {
            url,
            method,
            data,
            priority,
            strategy,
            depends_on,
            data_type,
        } => commands::sync::cmd_enqueue(
            &app,
            commands::sync::EnqueueArgs {
                url,
                method,
                data,
                priority,
                strategy,
                depends_on,
                data_type,
            },
        ),
        Commands::Sync { target, json } => {
            let strategy = match target {
                SyncTarget::Immediate => Some(astro_sync::strategy::IMMEDIATE),
                SyncTarget::Batch => Some(astro_sync::strategy::BATCH),
                SyncTarget::Background => Some(astro_sync::strategy::BACKGROUND),
                SyncTarget::All => None,
            };
            commands::sync::cmd_sync(&app, strategy, json).await
        }
        Commands::ClearQueue => commands::sync::cmd_clear_queue(&app),
        Commands::Cache { action } => match action {
            CacheAction::Put { key, value, ttl } => {
                commands::storage::cmd_cache_put(&app, &key, &value, ttl)
            }
            CacheAction::Get { key } => commands::storage::cmd_cache_get(&app, &key),
            CacheAction::Delete { key } => commands::storage::cmd_cache_delete(&app, &key),
            CacheAction::Clear => commands::storage::cmd_cache_clear(&app),
        },
        Commands::Cleanup => commands::storage::cmd_cleanup(&app),
        Commands::Stats { json } => commands::storage::cmd_stats(&app, json),
        Commands::Export { path } => commands::storage::cmd_export(&app, &path),
        Commands::Import { path } => commands::storage::cmd_import(&app, &path),
        Commands::Run => commands::run::cmd_run(&app).await,
    };

    if let Err(e) = app.close().await {
        tracing::warn!("Failed to close store: {}", e);
    }

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(EXIT_ERROR);
    }
}
