//! KubeAlert CLI
//!
//! Command-line interface for the KubeAlert alert definition service.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

use kubealert::api::{AppState, HttpServer};
use kubealert::config::LoggingConfig;
use kubealert::db::Database;
use kubealert::Config;

/// KubeAlert - Alert definitions for Kubernetes
#[derive(Parser)]
#[command(name = "kubealert")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "KUBEALERT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// HTTP API port (overrides the configuration)
        #[arg(long, env = "KUBEALERT_HTTP_PORT")]
        http_port: Option<u16>,

        /// Keep everything in memory instead of PostgreSQL
        #[arg(long)]
        memory: bool,
    },

    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Show system health status
    Health,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.logging, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve { http_port, memory } => run_serve(config, http_port, memory).await,
        Commands::Db { command } => run_db(config, command).await,
        Commands::Health => run_health(config).await,
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_serve(config: Config, http_port: Option<u16>, memory: bool) -> anyhow::Result<()> {
    let db = if memory {
        warn!("Using the in-memory store; data is lost on exit");
        Database::in_memory()
    } else {
        let db = Database::new(&config)
            .await
            .context("failed to connect to the database")?;
        db.migrate().await.context("failed to run migrations")?;
        db
    };

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install the metrics recorder")?;

    let addr = format!(
        "{}:{}",
        config.server.host,
        http_port.unwrap_or(config.server.http_port)
    );
    info!(
        addr = %addr,
        deadline = %humantime::format_duration(config.manager.deadline),
        redis_locks = db.redis.is_some(),
        "Starting KubeAlert API"
    );

    let state = AppState::new(db, config.manager.deadline, Some(metrics));
    HttpServer::new(state).serve(&addr).await?;
    Ok(())
}

async fn run_db(config: Config, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Migrate => {
            let db = Database::new(&config)
                .await
                .context("failed to connect to the database")?;
            db.migrate().await?;
            println!("Migrations applied");
        }
    }
    Ok(())
}

async fn run_health(config: Config) -> anyhow::Result<()> {
    let db = Database::new(&config)
        .await
        .context("failed to connect to the database")?;
    db.health_check().await?;

    println!("Database: connected");
    if db.redis.is_some() {
        println!("Redis:    connected");
    } else {
        println!("Redis:    not configured");
    }
    Ok(())
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "kubealert", &mut io::stdout());
}
