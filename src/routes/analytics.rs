use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    cache::CacheLayer, error::ApiError, shortid::GenerateShortId, state::AppState,
    store::UrlStore,
};

pub async fn analytics<Gen, Store, Cache>(
    Path(short_id): Path<String>,
    State(state): State<AppState<Gen, Store, Cache>>,
) -> Result<impl IntoResponse, ApiError>
where
    Gen: GenerateShortId + Clone + Send + Sync + 'static,
    Store: UrlStore + Clone + Send + Sync + 'static,
    Cache: CacheLayer + Clone + Send + Sync + 'static,
{
    let snapshot = state.analytics.get_analytics(&short_id).await?;
    Ok(Json(snapshot))
}
