//! KaaS API
//!
//! Runs the project orchestration engine's background duties and its
//! maintenance commands.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use kaas_api::activity::retention::RetentionWorker;
use kaas_api::activity::{retention_cutoff, ActivityLog};
use kaas_api::config::KaasConfig;
use kaas_api::db::Database;
use kaas_api::kubernetes::client::K8sClient;
use kaas_api::kubernetes::credentials::TenantClientResolver;
use kaas_api::kubernetes::VClusterAdapter;
use kaas_api::logging::LoggingConfig;
use kaas_api::shutdown::ShutdownCoordinator;
use kaas_api::ProjectService;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (overrides KAAS_CONFIG and the default locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations and the activity retention worker until interrupted
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Prune the activity trail once
    CleanupActivities {
        /// Keep this many days of history (defaults to the configured retention)
        #[arg(long)]
        days: Option<i64>,
    },
    /// Print a sample configuration file
    SampleConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::SampleConfig) = cli.command {
        print!("{}", KaasConfig::generate_sample());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    config.validate().context("invalid configuration")?;

    let _log_guard = LoggingConfig::from(&config.logging)
        .init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => {
            let db = open_database(&config).await?;
            db.close().await;
            info!("Migrations applied");
            Ok(())
        }
        Commands::CleanupActivities { days } => {
            let days = days.unwrap_or(config.activity.retention_days);
            let cutoff = retention_cutoff(Utc::now(), days).context("invalid --days")?;
            let db = open_database(&config).await?;
            let log = ActivityLog::new(db.pool().clone());
            let removed = log.cleanup_before(cutoff).await?;
            info!(removed, days, "Activity cleanup finished");
            println!("Removed {} activity entries older than {} days", removed, days);
            db.close().await;
            Ok(())
        }
        Commands::SampleConfig => Ok(()),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<KaasConfig> {
    match path {
        Some(path) => {
            let mut config = KaasConfig::load_from_file(path)?;
            config.apply_env_overrides();
            Ok(config)
        }
        None => Ok(KaasConfig::load()?),
    }
}

async fn open_database(config: &KaasConfig) -> Result<Database> {
    let db = Database::new(&config.database.url, config.database.max_connections)
        .await
        .context("failed to open database")?;
    db.migrate().await.context("failed to run migrations")?;
    Ok(db)
}

async fn serve(config: KaasConfig) -> Result<()> {
    info!("Starting KaaS API v{}", env!("CARGO_PKG_VERSION"));

    let db = open_database(&config).await?;

    let host = match &config.cluster.host_kubeconfig {
        Some(path) => K8sClient::from_kubeconfig_file(path, "host").await,
        None => K8sClient::infer("host").await,
    }
    .context("failed to build host cluster client")?;
    info!(api_server = %host.api_server(), "Connected to host cluster");

    let resolver = TenantClientResolver::new(host, config.cluster.clone());
    let service = ProjectService::new(db.clone(), Arc::new(VClusterAdapter::new(resolver)));

    let shutdown = ShutdownCoordinator::new();
    let worker = RetentionWorker::new(service.activity_log().clone(), &config.activity);
    let worker_handle = tokio::spawn(worker.run(shutdown.subscribe()));

    info!(
        control_namespace = %config.cluster.control_namespace,
        "Project service ready"
    );

    shutdown.wait_for_signal().await?;

    if let Err(e) = worker_handle.await {
        warn!("Retention worker ended abnormally: {}", e);
    }
    db.close().await;
    info!("Shutdown complete");

    Ok(())
}
