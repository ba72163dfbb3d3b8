use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    cache::CacheLayer, error::ApiError, links::PageRequest, routes::owner::RequiredOwner,
    shortid::GenerateShortId, state::AppState, store::UrlStore,
};

/// Raw paging values. Anything that is not a number falls back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListParams {
    fn page_request(&self) -> PageRequest {
        PageRequest::new(
            lenient_u64(self.page.as_deref()),
            lenient_u64(self.limit.as_deref()),
        )
    }
}

fn lenient_u64(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|v| v.trim().parse().ok())
}

pub async fn user_urls<Gen, Store, Cache>(
    State(state): State<AppState<Gen, Store, Cache>>,
    RequiredOwner(owner): RequiredOwner,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    Gen: GenerateShortId + Clone + Send + Sync + 'static,
    Store: UrlStore + Clone + Send + Sync + 'static,
    Cache: CacheLayer + Clone + Send + Sync + 'static,
{
    let Query(params) = params?;
    let page = state
        .links
        .list_for_owner(&owner, params.page_request())
        .await?;
    Ok(Json(page))
}
