//! Edge guard for the marketplace back-office.
//!
//! ```text
//!     Client ──▶ listener ──▶ request id ──▶ trace ──▶ edge guard ──▶ upstream
//!                                                        │               (back-office)
//!                                        reject (429/403)┘
//!
//!     Admin ──▶ {admin.path_prefix}/* (bearer key, not guarded)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_guard::config::{load_config, GuardConfig};
use edge_guard::lifecycle::signals::spawn_signal_handler;
use edge_guard::observability::{logging, metrics};
use edge_guard::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "edge-guard")]
#[command(about = "Request guard in front of the marketplace back-office", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "EDGE_GUARD_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("edge-guard v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        login_path = %config.login.path,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        max_attempts = config.login.max_attempts,
        lockout_secs = config.login.lockout_secs,
        "Configuration loaded"
    );
    if config.listener.trust_forwarded_for {
        tracing::warn!("Client ids taken from X-Forwarded-For; run behind a proxy that overwrites it");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
