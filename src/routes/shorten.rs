use std::net::Ipv4Addr;

use axum::{
    extract::{FromRequest, Json, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use url::{Host, Url};

use crate::{
    cache::CacheLayer, error::ApiError, routes::owner::OptionalOwner, shortid::GenerateShortId,
    state::AppState, store::UrlStore,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenRequest {
    #[serde(default)]
    pub original_url: String,
}

pub struct ValidatedShortenRequest {
    original_url: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortenResponse {
    pub msg: &'static str,
    pub short_url: String,
    pub short_id: String,
}

pub async fn shorten_url<Gen, Store, Cache>(
    State(state): State<AppState<Gen, Store, Cache>>,
    OptionalOwner(owner): OptionalOwner,
    request_body: ValidatedShortenRequest,
) -> Result<impl IntoResponse, ApiError>
where
    Gen: GenerateShortId + Clone + Send + Sync + 'static,
    Store: UrlStore + Clone + Send + Sync + 'static,
    Cache: CacheLayer + Clone + Send + Sync + 'static,
{
    let record = state
        .links
        .create(request_body.original_url, owner)
        .await?;

    let short_url = state.base_url.join(record.short_id.as_str())?;

    let mut headers = HeaderMap::with_capacity(1);
    headers.insert(header::LOCATION, HeaderValue::from_str(short_url.as_str())?);

    let body = Json(ShortenResponse {
        msg: "URL shortened successfully",
        short_url: short_url.to_string(),
        short_id: record.short_id.to_string(),
    });

    Ok((StatusCode::CREATED, headers, body))
}

impl<S> FromRequest<S> for ValidatedShortenRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<ShortenRequest>::from_request(req, state).await?;
        let raw = body.original_url.trim();
        if raw.is_empty() {
            return Err(ApiError::BadRequest("Original URL is required"));
        }
        let original_url = Url::parse(raw).map_err(|_| ApiError::BadRequest("Invalid URL"))?;
        validate_url(&original_url)?;
        Ok(ValidatedShortenRequest { original_url })
    }
}

/// Only public http(s) targets can be shortened.
fn validate_url(url: &Url) -> Result<(), ApiError> {
    matches!(url.scheme(), "http" | "https")
        .then_some(())
        .ok_or(ApiError::BadRequest("Only http and https are allowed"))?;

    match url.host() {
        Some(Host::Domain(d)) => {
            let d = d.to_ascii_lowercase();
            if d == "localhost" || d.ends_with(".local") {
                return Err(ApiError::BadRequest("Localhost URLs are not allowed"));
            }
        }
        Some(Host::Ipv4(ip)) => {
            if is_non_public_v4(ip) {
                return Err(ApiError::BadRequest(
                    "Private/loopback IP URLs are not allowed",
                ));
            }
        }
        Some(Host::Ipv6(ip)) => {
            // `::ffff:a.b.c.d` reaches the same host as `a.b.c.d`.
            if ip.to_ipv4_mapped().is_some_and(is_non_public_v4)
                || ip.is_loopback()
                || ip.is_unspecified()
                || ip.is_unique_local()
                || ip.is_unicast_link_local()
                || ip.is_multicast()
            {
                return Err(ApiError::BadRequest(
                    "Private/loopback IP URLs are not allowed",
                ));
            }
        }
        None => return Err(ApiError::BadRequest("Invalid URL")),
    }

    Ok(())
}

fn is_non_public_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(raw: &str) -> Result<(), ApiError> {
        validate_url(&Url::parse(raw).unwrap())
    }

    #[test]
    fn public_http_urls_pass() {
        assert!(check("https://example.com/a?b=c").is_ok());
        assert!(check("http://93.184.216.34/").is_ok());
        assert!(check("http://[::ffff:93.184.216.34]/").is_ok());
        assert!(check("http://[2606:2800:220:1::1]/").is_ok());
    }

    #[test]
    fn non_http_schemes_rejected() {
        assert!(matches!(
            check("ftp://example.com/file"),
            Err(ApiError::BadRequest("Only http and https are allowed"))
        ));
        assert!(check("javascript:alert(1)").is_err());
    }

    #[test]
    fn local_targets_rejected() {
        for raw in [
            "http://localhost:3000",
            "http://printer.local/",
            "http://127.0.0.1/",
            "http://10.1.2.3/",
            "http://192.168.0.1/",
            "http://169.254.169.254/latest/meta-data",
            "http://0.0.0.0/",
            "http://[::1]/",
            "http://[fd00::1]/",
            "http://[fe80::1]/",
            "http://[::ffff:127.0.0.1]/admin",
            "http://[::ffff:169.254.169.254]/latest/meta-data",
        ] {
            assert!(check(raw).is_err(), "{raw} should be rejected");
        }
    }
}
