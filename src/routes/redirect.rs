use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};

use crate::{
    cache::CacheLayer, error::ApiError, shortid::GenerateShortId, state::AppState,
    store::UrlStore,
};

/// `302 Found` to the original URL. The click is counted before the response is sent.
pub async fn redirect<Gen, Store, Cache>(
    Path(short_id): Path<String>,
    State(state): State<AppState<Gen, Store, Cache>>,
) -> Result<impl IntoResponse, ApiError>
where
    Gen: GenerateShortId + Clone + Send + Sync + 'static,
    Store: UrlStore + Clone + Send + Sync + 'static,
    Cache: CacheLayer + Clone + Send + Sync + 'static,
{
    let target = state.resolver.resolve(&short_id).await?;

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, HeaderValue::from_str(target.as_str())?)],
    ))
}
