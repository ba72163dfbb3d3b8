use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header::CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::AppConfig;
use crate::error::StartupError;
use crate::routes::owner::OWNER_HEADER;

/// Wrap `router` in a CORS layer when enabled and at least one origin is configured.
/// `"*"` allows any origin without credentials.
pub fn apply_cors<S>(router: Router<S>, config: &AppConfig) -> Result<Router<S>, StartupError>
where
    S: Clone + Send + Sync + 'static,
{
    if !config.cors_enabled {
        tracing::info!("CORS disabled via configuration");
        return Ok(router);
    }

    if config.cors_allowed_origins.is_empty() {
        tracing::info!("CORS enabled but no origins configured, skipping layer");
        return Ok(router);
    }

    let cors_layer = build_cors_layer(config)?;

    tracing::info!(
        origins = ?config.cors_allowed_origins,
        "CORS enabled with configured origins"
    );

    Ok(router.layer(cors_layer))
}

fn build_cors_layer(config: &AppConfig) -> Result<CorsLayer, StartupError> {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(OWNER_HEADER)]);

    let use_wildcard = config.cors_allowed_origins.contains(&"*".to_string());

    if use_wildcard {
        tracing::warn!("CORS configured with wildcard (*), credentials are disabled");
        cors = cors.allow_origin(AllowOrigin::any());
    } else {
        let origins: Result<Vec<_>, _> = config
            .cors_allowed_origins
            .iter()
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .map_err(|e| StartupError::InvalidCorsOrigin {
                        origin: origin.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect();

        cors = cors
            .allow_origin(AllowOrigin::list(origins?))
            .allow_credentials(true);
    }

    Ok(cors)
}
