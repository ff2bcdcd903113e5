use std::sync::Arc;

use hostgate::gateway::{GatewayConfig, gateway_routes};
use hostgate::session::{MemoryBackend, RedisBackend, SessionStore, spawn_sweeper};
use hostgate::StaticDirectory;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = GatewayConfig::from_env()?;

    let directory = match std::env::var("DIRECTORY_FILE") {
        Ok(path) => {
            let directory = StaticDirectory::from_json_file(&path)?;
            tracing::info!(path = %path, "Loaded directory");
            directory
        }
        Err(_) => {
            tracing::warn!("DIRECTORY_FILE not set; no users can log in");
            StaticDirectory::new()
        }
    };
    let directory = Arc::new(directory);

    let fallback = Arc::new(MemoryBackend::new());
    let sessions = Arc::new(
        SessionStore::new(RedisBackend::open(config.redis_url())?, fallback.clone())
            .with_lifetime(config.session_ttl())
            .with_cache_timeout(config.cache_timeout()),
    );
    if !sessions.primary_available().await {
        tracing::warn!("Session cache unreachable at startup; serving from fallback map");
    }

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(fallback, config.sweep_interval(), shutdown.clone());

    let addr = config.listen_addr();
    tracing::info!(
        addr = %addr,
        login_host = config.login_host(),
        production = config.is_production(),
        "Starting hostgate"
    );

    let app = gateway_routes(
        config,
        sessions,
        directory.clone(),
        directory.clone(),
        directory,
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Sweeper task ended abnormally");
    }
    tracing::info!("Shut down");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
    shutdown.cancel();
}
