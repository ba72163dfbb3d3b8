use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::ApiError, store::OwnerId};

/// Header carrying the caller's owner id, set by the upstream identity layer.
pub const OWNER_HEADER: &str = "x-owner-id";

/// Owner of the request, if the header is present and non-blank.
pub struct OptionalOwner(pub Option<OwnerId>);

/// Owner of the request; rejects with 401 when absent.
pub struct RequiredOwner(pub OwnerId);

fn owner_from_parts(parts: &Parts) -> Result<Option<OwnerId>, ApiError> {
    let Some(value) = parts.headers.get(OWNER_HEADER) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("Invalid x-owner-id header"))?;
    Ok(OwnerId::new(raw))
}

impl<S> FromRequestParts<S> for OptionalOwner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        owner_from_parts(parts).map(OptionalOwner)
    }
}

impl<S> FromRequestParts<S> for RequiredOwner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        owner_from_parts(parts)?
            .map(RequiredOwner)
            .ok_or(ApiError::Unauthorized)
    }
}
