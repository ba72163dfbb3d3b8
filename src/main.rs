use anyhow::Context;
use tokio::signal;

use linkpulse::config;
use linkpulse::shortid::random::RandomShortId;
use linkpulse::startup::{self, CacheImpl};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env()
        .context("Failed to load configuration (DATABASE_URL is required)")?;

    let _guard = match startup::init_logging(&config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            eprintln!("Continuing without structured logs...");
            None
        }
    };

    RandomShortId::warm_up();

    let store = startup::init_store(&config).await?;
    let cache = startup::init_cache(&config).await;

    let sweeper = match &cache {
        CacheImpl::Memory(memory) => Some(startup::spawn_cache_sweeper(
            memory.clone(),
            config.memory_cache_sweep_secs,
        )),
        CacheImpl::Redis(_) => None,
    };

    let router = startup::build_app(&config, store, cache, RandomShortId);
    let router = linkpulse::cors::apply_cors(router, &config)?;

    let addr = config.to_socket_addr().await?;
    startup::start_server(router, addr, shutdown_signal()).await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
    tracing::info!("Shutdown signal received");
}
