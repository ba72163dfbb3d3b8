use std::time::Duration;

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Failures raised while bringing the service up.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Failed to set global logger")]
    SetGlobalLogger(#[from] tracing_log::log_tracer::SetLoggerError),
    #[error("Failed to set global subscriber")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid CORS origin '{origin}': {reason}")]
    InvalidCorsOrigin { origin: String, reason: String },
    #[error("Server error: {0}")]
    Server(String),
}

/// Errors from the durable store adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Short id `{0}` already exists")]
    Conflict(String),
    #[error("Durable store unavailable: {0}")]
    Unavailable(String),
    #[error("Stored record is malformed: {0}")]
    Corrupt(String),
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn timed_out(operation: &'static str, after: Duration) -> Self {
        StoreError::Unavailable(format!("{operation} timed out after {after:?}"))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            other => StoreError::Database(other),
        }
    }
}

/// Errors from a cache backend. These never leave the guarded cache wrapper.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to create cache pool: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),
    #[error("Cache connection pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
    #[error("Cache command failed: {0}")]
    Command(#[from] deadpool_redis::redis::RedisError),
    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors surfaced by the link operations to their callers.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Short link not found")]
    NotFound,
    #[error("Invalid original URL: {0}")]
    InvalidUrl(String),
    #[error("Short id `{0}` already exists")]
    Conflict(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Excessive short id collisions")]
    ExcessiveShortIdCollisions,
    #[error(transparent)]
    Store(StoreError),
}

impl LinkError {
    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LinkError::Unavailable(_) | LinkError::ExcessiveShortIdCollisions
        )
    }
}

impl From<StoreError> for LinkError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(id) => LinkError::Conflict(id),
            StoreError::Unavailable(reason) => LinkError::Unavailable(reason),
            other => LinkError::Store(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not found")]
    NotFound,
    #[error("Conflict")]
    Conflict,
    #[error("Invalid JSON")]
    InvalidJson(#[from] JsonRejection),
    #[error("Invalid query")]
    InvalidQuery(#[from] QueryRejection),
    #[error("Invalid header value")]
    ResponseHeaderError(#[from] header::InvalidHeaderValue),
    #[error(transparent)]
    Internal(LinkError),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<LinkError> for ApiError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::NotFound => ApiError::NotFound,
            LinkError::InvalidUrl(_) => ApiError::BadRequest("Invalid URL"),
            LinkError::Conflict(_) => ApiError::Conflict,
            other => ApiError::Internal(other),
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(_: url::ParseError) -> Self {
        ApiError::BadRequest("Invalid URL")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // error! for conditions that look like bugs, warn! for transient
        // failures, nothing for client mistakes.
        let (status, body) = match &self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "bad_request",
                    error: msg,
                    details: None,
                },
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "unauthorized",
                    error: "Owner identity required",
                    details: Some("Missing x-owner-id header".to_string()),
                },
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "not_found",
                    error: "Resource not found",
                    details: Some("The requested short URL does not exist".to_string()),
                },
            ),
            ApiError::Conflict => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "conflict",
                    error: "Resource already exists",
                    details: Some("A short URL with this id already exists".to_string()),
                },
            ),
            ApiError::InvalidJson(_) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "invalid_json",
                    error: "Invalid JSON in request body",
                    details: None,
                },
            ),
            ApiError::InvalidQuery(_) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "invalid_query",
                    error: "Invalid query parameters",
                    details: None,
                },
            ),

            ApiError::ResponseHeaderError(e) => {
                error!(error = ?e, "Failed to construct response header");

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "internal_error",
                        error: "Internal server error",
                        details: None,
                    },
                )
            }

            ApiError::Internal(e) => match e {
                LinkError::Unavailable(reason) => {
                    warn!(reason = %reason, "Durable store unavailable");

                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        ErrorBody {
                            code: "service_unavailable",
                            error: "Service temporarily unavailable",
                            details: Some("Please try again later".to_string()),
                        },
                    )
                }
                LinkError::ExcessiveShortIdCollisions => {
                    warn!("Excessive short id collisions - possible capacity issue");

                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        ErrorBody {
                            code: "service_unavailable",
                            error: "Service temporarily unavailable",
                            details: Some(
                                "Unable to generate unique short id, please try again later"
                                    .to_string(),
                            ),
                        },
                    )
                }
                other => {
                    error!(error = ?other, "Unexpected internal error");

                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorBody {
                            code: "internal_error",
                            error: "Internal server error",
                            details: None,
                        },
                    )
                }
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_maps_to_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(LinkError::from(err).is_retryable());
    }

    #[test]
    fn row_not_found_stays_a_database_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!LinkError::from(err).is_retryable());
    }

    #[test]
    fn not_found_and_unavailable_have_distinct_statuses() {
        let not_found = ApiError::from(LinkError::NotFound).into_response();
        let unavailable =
            ApiError::from(LinkError::Unavailable("down".into())).into_response();

        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn invalid_url_is_a_client_error() {
        let response = ApiError::from(LinkError::InvalidUrl("ftp".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conflict_maps_to_409() {
        let response = ApiError::from(LinkError::Conflict("abc12345".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
