use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, Level};

use prometheus_bridge::DomainMetrics;
use telemetry_service::{serve, AppState, ServiceConfig};

#[derive(Debug, Parser)]
#[command(
    name = "telemetry-service",
    about = "Synthetic telemetry domains with threshold-gated operations"
)]
struct Args {
    /// JSON service config; the built-in domains are used when absent.
    #[arg(long, env = "TELEMETRY_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Overrides the listen address from the config file.
    #[arg(long, env = "TELEMETRY_LISTEN", value_name = "ADDR")]
    listen: Option<SocketAddr>,

    #[arg(long, env = "TELEMETRY_LOG", default_value = "info")]
    log_level: Level,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Seeds every domain's noise stream for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
}

fn init_tracing(level: Level, json: bool) {
    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level, args.log_json);

    let mut config = match &args.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let domains = config.build_simulators()?;
    let metrics = DomainMetrics::new().context("registering prometheus metrics")?;
    info!(
        domains = ?domains.keys().collect::<Vec<_>>(),
        "telemetry domains ready"
    );

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    info!(addr = %config.listen, "telemetry-service listening");

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    serve(listener, AppState::new(domains, metrics), shutdown).await
}
