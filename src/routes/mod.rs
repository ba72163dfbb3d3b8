use axum::{
    Router,
    routing::{get, post},
};

use crate::cache::CacheLayer;
use crate::shortid::GenerateShortId;
use crate::state::AppState;
use crate::store::UrlStore;

pub mod analytics;
pub mod health;
pub mod owner;
pub mod redirect;
pub mod shorten;
pub mod user_urls;

/// Build router with all routes configured
pub fn build_router<Gen, Store, Cache>(state: AppState<Gen, Store, Cache>) -> Router
where
    Gen: GenerateShortId + Clone + Send + Sync + 'static,
    Store: UrlStore + Clone + Send + Sync + 'static,
    Cache: CacheLayer + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health_check", get(health::health_check))
        .route(
            "/api/url/shorten",
            post(shorten::shorten_url::<Gen, Store, Cache>),
        )
        .route(
            "/api/url/analytics/{short_id}",
            get(analytics::analytics::<Gen, Store, Cache>),
        )
        .route(
            "/api/url/user-urls",
            get(user_urls::user_urls::<Gen, Store, Cache>),
        )
        .route("/{short_id}", get(redirect::redirect::<Gen, Store, Cache>))
        .with_state(state)
}
