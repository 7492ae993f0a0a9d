//! Maps domain errors to HTTP responses (`spec.md` §7 propagation policy:
//! "the HTTP response for a known-bad request uses the matching status;
//! unknown failures use 500 with an internal code").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use repodoc_domain::error::{Error, ErrorCategory};
use serde::Serialize;

/// Error body returned on every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable category code (`spec.md` §7).
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

/// Newtype so [`Error`] can implement [`IntoResponse`] without violating the
/// orphan rule.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.category());
        let body = ErrorBody { code: self.0.category().code(), message: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}

/// HTTP status for each error category (`spec.md` §7).
#[must_use]
pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Queue => StatusCode::TOO_MANY_REQUESTS,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Invalid => StatusCode::BAD_REQUEST,
        ErrorCategory::Cancelled => StatusCode::CONFLICT,
        ErrorCategory::Timeout
        | ErrorCategory::Parsing
        | ErrorCategory::FileSystem
        | ErrorCategory::Provider
        | ErrorCategory::Repository
        | ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_full_maps_to_429() {
        assert_eq!(status_for(ErrorCategory::Queue), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(status_for(ErrorCategory::NotFound), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_maps_to_400() {
        assert_eq!(status_for(ErrorCategory::Invalid), StatusCode::BAD_REQUEST);
    }
}
