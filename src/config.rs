use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use anyhow::Context;
use config::{self, Config, Environment};
use dotenvy::dotenv;
use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use url::Url;

use crate::cache::CacheTtls;

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    // --- Server ---
    /// APP_HOST - bind host (default `0.0.0.0`)
    #[serde(default = "default_app_host")]
    pub app_host: String,
    /// APP_PORT - bind port (default `8080`)
    #[serde(default = "default_app_port")]
    pub app_port: u16,
    /// BASE_URL - external base URL that short links are built on (default `http://localhost:8080`)
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    // --- Durable store ---
    /// DATABASE_URL - Postgres DSN (required)
    pub database_url: Url,
    /// DB_POOL_SIZE - maximum number of database connections (default `20`)
    #[serde(default = "default_db_pool_size")]
    pub db_pool_size: u32,
    /// RUN_MIGRATIONS - apply embedded migrations at startup (default `true`)
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
    /// STORE_TIMEOUT_MS - deadline for each store call (default `2000`)
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: Duration,

    // --- Cache ---
    /// REDIS_CACHE_URL - optional Redis connection string; an in-process cache is used without it
    #[serde(default)]
    pub redis_cache_url: Option<Url>,
    /// CACHE_TIMEOUT_MS - deadline for each cache call (default `250`)
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_cache_timeout_ms")]
    pub cache_timeout_ms: Duration,
    /// RESOLUTION_CACHE_TTL_SECS - lifetime of `resolution:` entries (default `3600`)
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_resolution_cache_ttl_secs")]
    pub resolution_cache_ttl_secs: Duration,
    /// ANALYTICS_CACHE_TTL_SECS - lifetime of `analytics:` entries (default `3600`)
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_analytics_cache_ttl_secs")]
    pub analytics_cache_ttl_secs: Duration,
    /// LISTING_CACHE_TTL_SECS - lifetime of `listing:` entries (default `600`)
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_listing_cache_ttl_secs")]
    pub listing_cache_ttl_secs: Duration,
    /// MEMORY_CACHE_SWEEP_SECS - how often the in-process cache drops expired entries (default `60`)
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_memory_cache_sweep_secs")]
    pub memory_cache_sweep_secs: Duration,

    // --- Short id generation ---
    /// SHORTID_MAX_RETRIES - attempts to find an unused short id (default `5`)
    #[serde(default = "default_shortid_max_retries")]
    pub shortid_max_retries: u32,

    // --- CORS ---
    /// CORS_ENABLED - enable CORS middleware (default `false`)
    #[serde(default)]
    pub cors_enabled: bool,
    /// CORS_ALLOWED_ORIGINS - list of allowed CORS origins (default `[]`)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    // --- Logging ---
    /// LOG_FORMAT - log format (default `json`)
    #[serde(default)]
    pub log_format: LogFormat,
    /// RUST_LOG - Rust log level (default `"info"`)
    #[serde(default = "default_rust_log")]
    pub rust_log: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    #[default]
    Json,
}

fn default_app_host() -> String {
    "0.0.0.0".to_string()
}

fn default_base_url() -> Url {
    Url::parse("http://localhost:8080").expect("default base URL is valid")
}

const fn default_app_port() -> u16 {
    8080
}

const fn default_db_pool_size() -> u32 {
    20
}

const fn default_run_migrations() -> bool {
    true
}

const fn default_store_timeout_ms() -> Duration {
    Duration::from_millis(2_000)
}

const fn default_cache_timeout_ms() -> Duration {
    Duration::from_millis(250)
}

const fn default_resolution_cache_ttl_secs() -> Duration {
    Duration::from_secs(3600)
}

const fn default_analytics_cache_ttl_secs() -> Duration {
    Duration::from_secs(3600)
}

const fn default_listing_cache_ttl_secs() -> Duration {
    Duration::from_secs(600)
}

const fn default_memory_cache_sweep_secs() -> Duration {
    Duration::from_secs(60)
}

const fn default_shortid_max_retries() -> u32 {
    5
}

fn default_rust_log() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let settings = Config::builder()
            .add_source(
                Environment::default()
                    .try_parsing(true)
                    .ignore_empty(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_allowed_origins"),
            )
            .build()?;

        let cfg = settings.try_deserialize::<AppConfig>()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate URL schemes and cross-field invariants.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.database_url.scheme() {
            "postgres" | "postgresql" => {}
            other => anyhow::bail!("Unsupported DATABASE_URL scheme: {}", other),
        }

        if let Some(redis) = &self.redis_cache_url {
            match redis.scheme() {
                "redis" | "rediss" => {}
                other => anyhow::bail!("Unsupported REDIS_CACHE_URL scheme: {}", other),
            }
        }

        if self.base_url.scheme() != "http" && self.base_url.scheme() != "https" {
            anyhow::bail!("BASE_URL must start with `http://` or `https://`");
        }
        if self.base_url.cannot_be_a_base() {
            anyhow::bail!("BASE_URL must be usable as a base for short links");
        }

        if self.db_pool_size == 0 {
            anyhow::bail!("DB_POOL_SIZE must be > 0");
        }

        for (name, ttl) in [
            ("RESOLUTION_CACHE_TTL_SECS", self.resolution_cache_ttl_secs),
            ("ANALYTICS_CACHE_TTL_SECS", self.analytics_cache_ttl_secs),
            ("LISTING_CACHE_TTL_SECS", self.listing_cache_ttl_secs),
            ("MEMORY_CACHE_SWEEP_SECS", self.memory_cache_sweep_secs),
        ] {
            if ttl.is_zero() {
                anyhow::bail!("{name} must be > 0");
            }
        }

        if self.cache_timeout_ms.is_zero() {
            anyhow::bail!("CACHE_TIMEOUT_MS must be > 0");
        }
        if self.store_timeout_ms.is_zero() {
            anyhow::bail!("STORE_TIMEOUT_MS must be > 0");
        }

        if self.shortid_max_retries == 0 {
            anyhow::bail!("SHORTID_MAX_RETRIES must be > 0");
        }

        // CORS origins must be "*" or valid URLs
        for origin in &self.cors_allowed_origins {
            if origin != "*" {
                url::Url::parse(origin)
                    .with_context(|| format!("Invalid CORS origin: {}", origin))?;
            }
        }

        Ok(())
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            resolution: self.resolution_cache_ttl_secs,
            analytics: self.analytics_cache_ttl_secs,
            listing: self.listing_cache_ttl_secs,
        }
    }

    /// Build a SocketAddr for listening from APP_HOST and APP_PORT.
    pub async fn to_socket_addr(&self) -> anyhow::Result<SocketAddr> {
        if let Ok(ip) = self.app_host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.app_port));
        }

        tokio::net::lookup_host((self.app_host.as_str(), self.app_port))
            .await
            .with_context(|| format!("Failed to resolve {}:{}", self.app_host, self.app_port))?
            .next()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No addresses resolved for {}:{}",
                    self.app_host,
                    self.app_port
                )
            })
    }
}
