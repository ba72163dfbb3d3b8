use std::{net::SocketAddr, time::Duration};

use axum::Router;
use tokio::task::JoinHandle;
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    cache::{GuardedCache, memory::MemoryCache, redis::RedisCache},
    config::{AppConfig, LogFormat},
    error::StartupError,
    logging::try_init_subscriber,
    shortid::GenerateShortId,
    state::AppState,
    store::{TimedStore, postgresql::PgStore},
};

/// Cache backend chosen at startup.
pub enum CacheImpl {
    Redis(RedisCache),
    Memory(MemoryCache),
}

/// Install the global subscriber. Log lines go through a non-blocking stdout
/// writer that is flushed when the returned guard drops.
pub fn init_logging(config: &AppConfig) -> Result<WorkerGuard, StartupError> {
    let (stdout, guard) = tracing_appender::non_blocking(std::io::stdout());

    match config.log_format {
        LogFormat::Json => {
            let subscriber =
                crate::logging::build_json_subscriber("linkpulse", &config.rust_log, stdout);
            try_init_subscriber(subscriber)?;
        }
        LogFormat::Plain => {
            let subscriber = crate::logging::build_plain_subscriber(&config.rust_log, stdout);
            try_init_subscriber(subscriber)?;
        }
    }

    Ok(guard)
}

/// Connect to Postgres, apply migrations when enabled, and put a deadline on every call.
pub async fn init_store(config: &AppConfig) -> Result<TimedStore<PgStore>, StartupError> {
    let store = PgStore::try_from_database_url(
        config.database_url.as_str(),
        config.db_pool_size,
        config.store_timeout_ms,
    )
    .await?;

    if config.run_migrations {
        tracing::info!("Running database migrations");
        store.migrate().await?;
    }

    Ok(TimedStore::new(store, config.store_timeout_ms))
}

/// Pick the cache backend. Never fails: the service runs correctly without a
/// shared cache, only slower.
///
/// A Redis URL that cannot be turned into a pool falls back to the in-process
/// cache. A Redis server that is merely unreachable is kept; calls degrade to
/// misses until it comes back.
pub async fn init_cache(config: &AppConfig) -> CacheImpl {
    let Some(cache_url) = &config.redis_cache_url else {
        tracing::info!("Redis cache not configured, using in-process cache");
        return CacheImpl::Memory(MemoryCache::new());
    };

    tracing::info!(
        host = cache_url.host_str().unwrap_or_default(),
        "Initializing Redis cache"
    );

    let cache = match RedisCache::try_from_redis_url(cache_url.as_str()) {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to build Redis pool, falling back to in-process cache"
            );
            return CacheImpl::Memory(MemoryCache::new());
        }
    };

    match tokio::time::timeout(config.cache_timeout_ms, cache.ping()).await {
        Ok(Ok(())) => tracing::info!("Redis cache initialized successfully"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Redis cache unreachable, starting degraded"),
        Err(_) => tracing::warn!("Redis cache ping timed out, starting degraded"),
    }

    CacheImpl::Redis(cache)
}

/// Periodically drop expired entries from the in-process cache.
pub fn spawn_cache_sweeper(cache: MemoryCache, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = cache.len(), "Purged expired cache entries");
            }
        }
    })
}

/// Build application state for the chosen cache backend and return the router.
pub fn build_app<Gen, Store>(
    config: &AppConfig,
    store: Store,
    cache: CacheImpl,
    generator: Gen,
) -> Router
where
    Gen: GenerateShortId + Clone + Send + Sync + 'static,
    Store: crate::store::UrlStore + Clone + Send + Sync + 'static,
{
    match cache {
        CacheImpl::Redis(redis) => {
            let state = AppState::new(
                config.base_url.clone(),
                generator,
                store,
                GuardedCache::new(redis, config.cache_timeout_ms),
                config.cache_ttls(),
                config.shortid_max_retries,
            );
            crate::routes::build_router(state)
        }
        CacheImpl::Memory(memory) => {
            let state = AppState::new(
                config.base_url.clone(),
                generator,
                store,
                GuardedCache::new(memory, config.cache_timeout_ms),
                config.cache_ttls(),
                config.shortid_max_retries,
            );
            crate::routes::build_router(state)
        }
    }
}

/// Start the HTTP server with graceful shutdown
pub async fn start_server<F>(
    router: Router,
    addr: SocketAddr,
    shutdown_signal: F,
) -> Result<(), StartupError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| StartupError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .map_err(|e| StartupError::Server(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheLayer;
    use crate::clock::ManualClock;
    use config::{Config, File, FileFormat};
    use std::sync::Arc;

    fn config_from_toml(toml: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[tokio::test]
    async fn no_redis_url_uses_memory_cache() {
        let config = config_from_toml(r#"database_url = "postgres://u:p@h:5432/db""#);
        assert!(matches!(init_cache(&config).await, CacheImpl::Memory(_)));
    }

    #[tokio::test]
    async fn unreachable_redis_is_kept_degraded() {
        let config = config_from_toml(
            r#"
                database_url = "postgres://u:p@h:5432/db"
                redis_cache_url = "redis://127.0.0.1:1"
                cache_timeout_ms = 200
            "#,
        );
        assert!(matches!(init_cache(&config).await, CacheImpl::Redis(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_purges_expired_entries() {
        let clock = ManualClock::default();
        let cache = MemoryCache::with_clock(Arc::new(clock.clone()));
        cache
            .set("listing:alice:1:10", "{}", Duration::from_secs(600))
            .await
            .unwrap();

        let sweeper = spawn_cache_sweeper(cache.clone(), Duration::from_secs(60));
        clock.advance(chrono::Duration::seconds(601));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert!(cache.is_empty());
        sweeper.abort();
    }
}
