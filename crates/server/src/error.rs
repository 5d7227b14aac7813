//! API error mapping.
//!
//! Every core error kind gets a stable HTTP status. The response body is a
//! small JSON object carrying the error message; internal details (sources,
//! backtraces) stay in the logs.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use signet_hsm::HsmError;
use signet_ledger::LedgerError;
use thiserror::Error;

/// Errors surfaced by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was well-formed JSON but carried an unusable value
    /// (e.g. a signature that is not valid hex).
    #[error("{0}")]
    BadRequest(String),

    /// An HSM protocol error, passed through unchanged from the core.
    #[error(transparent)]
    Hsm(#[from] HsmError),

    /// An audit ledger error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Hsm(err) => match err {
                HsmError::Authentication { .. } => StatusCode::UNAUTHORIZED,
                HsmError::KeyNotFound { .. } => StatusCode::NOT_FOUND,
                HsmError::AmbiguousKey { .. } => StatusCode::CONFLICT,
                HsmError::DeviceUnavailable { .. }
                | HsmError::Initialization { .. }
                | HsmError::Session { .. } => StatusCode::BAD_GATEWAY,
                HsmError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ApiError::BadRequest("bad hex".into()), StatusCode::BAD_REQUEST),
            (HsmError::authentication("rejected").into(), StatusCode::UNAUTHORIZED),
            (HsmError::key_not_found("k").into(), StatusCode::NOT_FOUND),
            (HsmError::ambiguous_key("k", 2).into(), StatusCode::CONFLICT),
            (HsmError::session("gone").into(), StatusCode::BAD_GATEWAY),
            (
                LedgerError::corrupted(1, "link mismatch").into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }
}
