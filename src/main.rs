//! Kirby content proxy server.
//!
//! Configuration comes from the TOML file named by the first argument or
//! `KIRBY_PROXY_CONFIG`; without either, defaults plus `KIRBY_*` environment
//! variables are used.

use std::path::PathBuf;

use tokio::net::TcpListener;

use kirby_proxy::config::{self, ProxyConfig};
use kirby_proxy::observability::{init_metrics, init_tracing};
use kirby_proxy::{HttpServer, Shutdown};

fn load() -> Result<ProxyConfig, config::ConfigError> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("KIRBY_PROXY_CONFIG").ok())
        .map(PathBuf::from);
    match path {
        Some(path) => config::load_config(&path),
        None => config::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("kirby-proxy: {e}");
            std::process::exit(2);
        }
    };

    init_tracing(&config.observability);
    tracing::info!("kirby-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        auth_mode = ?config.auth.mode,
        query_path = %config.upstream.query_path,
        server_cache = config.server.cache,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
