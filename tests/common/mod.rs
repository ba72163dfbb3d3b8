#![allow(dead_code)]

use std::{env, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use http_body_util::BodyExt;
use linkpulse::{
    cache::{CacheLayer, CacheTtls, GuardedCache},
    error::CacheError,
    routes,
    shortid::random::RandomShortId,
    state::AppState,
    store::{UrlStore, postgresql::MIGRATOR},
};
use serde_json::Value;
use sqlx::{Executor, PgPool, postgres::PgPoolOptions};
use url::Url;

pub const BASE_URL: &str = "http://sho.rt";

/// Router over the given store and cache, wired the way startup does it.
pub fn build_test_app<S, C>(store: S, cache: C) -> Router
where
    S: UrlStore + Clone + Send + Sync + 'static,
    C: CacheLayer + Clone + Send + Sync + 'static,
{
    build_test_app_at(BASE_URL, store, cache)
}

/// Same as [`build_test_app`] with short links built on `base_url`.
pub fn build_test_app_at<S, C>(base_url: &str, store: S, cache: C) -> Router
where
    S: UrlStore + Clone + Send + Sync + 'static,
    C: CacheLayer + Clone + Send + Sync + 'static,
{
    let state = AppState::new(
        Url::parse(base_url).unwrap(),
        RandomShortId,
        store,
        GuardedCache::new(cache, Duration::from_millis(250)),
        CacheTtls::default(),
        5,
    );
    routes::build_router(state)
}

/// A cache backend that is down: every call fails.
#[derive(Clone, Default)]
pub struct UnreachableCache;

impl CacheLayer for UnreachableCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Timeout(Duration::ZERO))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Timeout(Duration::ZERO))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Timeout(Duration::ZERO))
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn get_as(uri: &str, owner: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-owner-id", owner)
        .body(Body::empty())
        .unwrap()
}

pub fn shorten(original_url: &str, owner: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/url/shorten")
        .header("content-type", "application/json");
    if let Some(owner) = owner {
        builder = builder.header("x-owner-id", owner);
    }
    builder
        .body(Body::from(
            serde_json::json!({ "originalUrl": original_url }).to_string(),
        ))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// Fresh database with migrations applied.
pub async fn setup_test_db() -> PgPool {
    let base = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .expect("Set TEST_DATABASE_URL or DATABASE_URL to a Postgres URL");

    let mut server_url = Url::parse(&base).expect("Invalid Postgres URL");
    server_url.set_path("postgres");

    let admin_pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(server_url.as_str())
        .await
        .expect("Failed to connect to Postgres");

    let db_name = format!(
        "linkpulse_it_{:x}",
        uuid::Uuid::new_v4().as_u128()
    );
    admin_pool
        .execute(format!(r#"CREATE DATABASE "{}""#, db_name).as_str())
        .await
        .expect("Failed to create test database");

    let mut db_url = server_url.clone();
    db_url.set_path(&db_name);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url.as_str())
        .await
        .expect("Failed to connect to test database");

    MIGRATOR.run(&pool).await.expect("Failed to run migrations");
    pool
}

pub fn redis_url() -> String {
    env::var("TEST_REDIS_URL")
        .or_else(|_| env::var("REDIS_URL"))
        .unwrap_or_else(|_| "redis://localhost:6379".to_string())
}
