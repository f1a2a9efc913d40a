mod balance;
mod cache;
mod config;
mod error;
mod layers;
mod metrics;
mod provider;
#[cfg(test)]
mod testing;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::balance::{Coordinator, RunContext};
use crate::config::Config;
use crate::metrics::MetricsRegistry;
use crate::provider::{LambdaProvider, LayerProvider};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "layer-balancer",
    about = "Bring every region's Lambda layers up to the highest published version"
)]
struct Cli {
    /// YAML file overriding the built-in layer and region tables.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// Write the run's counters to this file in OpenMetrics text format.
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

// ---------------------------------------------------------------------------
// Interrupt handling
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::warn!("received SIGINT, cancelling run"),
        () = terminate => tracing::warn!("received SIGTERM, cancelling run"),
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

fn load(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => {
            let config = Config::default();
            config::validate_config(&config)?;
            config
        }
    };
    Ok(config)
}

async fn run(cli: &Cli) -> Result<i64> {
    let config = load(cli)?;
    tracing::info!(
        layers = config.layers.len(),
        regions = config.regions.len(),
        canonical_region = %config.canonical_region,
        "starting layer balancer"
    );

    let http_client = reqwest::Client::builder()
        .user_agent(concat!("layer-balancer/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build reqwest client")?;
    let provider: Arc<dyn LayerProvider> = Arc::new(LambdaProvider::new(http_client));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let ctx = RunContext::new(&config, provider, MetricsRegistry::new());
    let coordinator = Coordinator::new(ctx, shutdown);
    let outcome = coordinator.run().await;

    let metrics = &coordinator.context().metrics;
    log_summary(metrics, &config);
    if let Some(path) = &cli.metrics_out {
        export_metrics(metrics, path).await;
    }

    Ok(outcome?)
}

fn log_summary(registry: &MetricsRegistry, config: &Config) {
    let m = &registry.metrics;
    tracing::info!(
        probes = m.probes.get(),
        publishes = m.total_publishes(&config.regions),
        permission_grants = m.permission_grants.get(),
        downloads = m.downloads.get(),
        download_bytes = m.download_bytes.get(),
        "run summary"
    );
}

/// The run outcome decides the exit code, so a failed export is only logged.
async fn export_metrics(registry: &MetricsRegistry, path: &Path) {
    if let Err(e) = write_metrics(registry, path).await {
        tracing::warn!(
            error = %format!("{e:#}"),
            path = %path.display(),
            "metrics export failed"
        );
    }
}

async fn write_metrics(registry: &MetricsRegistry, path: &Path) -> Result<()> {
    let text = registry.encode().context("failed to encode metrics")?;
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("failed to write metrics to {}", path.display()))
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(&cli).await {
        Ok(target) => {
            tracing::info!(target, "done, every layer is at the target version");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "layer balancing failed");
            ExitCode::FAILURE
        }
    }
}
