use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use datacommit_core::config::{LogFormat, LoggingConfig};
use datacommit_core::{
    load_config, metrics, validate_config, CommitProcessor, GitRepository, ObjectStoreBackend,
    ProcessControl, RemoteStore, Repository, SanitizedConfig, SignalProcessControl,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commits released judger test data into the judger data repository.
#[derive(Debug, Parser)]
#[command(name = "judger-data-commit", version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "DATACOMMIT_CONFIG", default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!("Failed to load config from {:?}: {}", args.config, e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging);

    if let Err(e) = run(config).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let json = logging.format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

async fn run(config: datacommit_core::Config) -> Result<()> {
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    let config_json = serde_json::to_string(&sanitized).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Starting judger data commit"
    );
    info!("Configuration: {}", config_json);

    let store: Arc<dyn RemoteStore> = Arc::new(
        ObjectStoreBackend::from_config(&config.store).context("Failed to create object store")?,
    );
    info!("Using {} object store", store.name());

    let repository: Arc<dyn Repository> = Arc::new(GitRepository::new(&config.repository));
    let process: Arc<dyn ProcessControl> = Arc::new(SignalProcessControl::new());

    let processor = CommitProcessor::from_config(&config, store, repository, process);

    let outcome = tokio::select! {
        result = processor.run() => Some(result),
        _ = shutdown_signal() => None,
    };

    if outcome.is_none() {
        metrics::RUNS_TOTAL.with_label_values(&["cancelled"]).inc();
    }
    if let Some(path) = &config.metrics.textfile_path {
        if let Err(e) = metrics::write_textfile(path).await {
            warn!(path = %path.display(), error = %e, "Failed to write metrics");
        }
    }

    match outcome {
        None => bail!("Interrupted by shutdown signal"),
        Some(Err(e)) => Err(e).context("Commit run aborted"),
        Some(Ok(report)) => {
            info!("Run report: {}", serde_json::to_string(&report).unwrap_or_default());
            if !report.is_success() {
                bail!(
                    "{} request(s) failed and {} were skipped",
                    report.failed.len(),
                    report.skipped.len()
                );
            }
            Ok(())
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, stopping"),
        _ = terminate => info!("Received SIGTERM, stopping"),
    }
}
