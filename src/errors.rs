use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Why a cross-origin request was turned away.
///
/// These are client faults: the response is the configured block status
/// (default 429) with a stable `error_code` the caller can dispatch on.
/// They are rendered by the admission guard itself, which also attaches
/// CORS headers so a browser caller can actually read the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    MissingToken,
    InvalidToken,
    OriginNotAllowed,
    LimitExceeded,
}

impl BlockReason {
    pub fn message(&self) -> &'static str {
        match self {
            BlockReason::MissingToken => "Missing API token",
            BlockReason::InvalidToken => "Invalid API token",
            BlockReason::OriginNotAllowed => "Origin not allowed",
            BlockReason::LimitExceeded => "Request limit exceeded",
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            BlockReason::MissingToken => "missing_token",
            BlockReason::InvalidToken => "invalid_token",
            BlockReason::OriginNotAllowed => "origin_not_allowed",
            BlockReason::LimitExceeded => "limit_exceeded",
        }
    }
}

/// Infrastructure faults on the admission path.
///
/// The store trait surfaces its failures as `anyhow::Error`, so every
/// fault arrives here through the one `Internal` variant. Never converted
/// into a block and never silently admitted: the caller gets a 5xx and
/// the token's quota is untouched.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let GuardError::Internal(e) = &self;
        tracing::error!("internal error: {:#}", e);

        let body = Json(json!({
            "message": "internal server error",
            "error_code": "internal_error",
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_reason_codes_are_stable() {
        assert_eq!(BlockReason::MissingToken.error_code(), "missing_token");
        assert_eq!(BlockReason::InvalidToken.error_code(), "invalid_token");
        assert_eq!(
            BlockReason::OriginNotAllowed.error_code(),
            "origin_not_allowed"
        );
        assert_eq!(BlockReason::LimitExceeded.error_code(), "limit_exceeded");
    }
}
