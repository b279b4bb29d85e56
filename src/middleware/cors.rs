//! CORS header synthesis.
//!
//! Every response on the cross-origin path carries these headers —
//! admitted, blocked, and preflight alike — so a browser caller can always
//! read the outcome instead of hitting an opaque CORS failure. The request
//! origin is echoed verbatim; a literal `*` is never sent, which keeps the
//! headers valid alongside `Access-Control-Allow-Credentials`.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, VARY,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::CorsConfig;

pub const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Attach the CORS header set to a substantive (non-preflight) response.
pub fn apply(headers: &mut HeaderMap, origin: Option<&str>, cors: &CorsConfig) {
    base_headers(headers, origin, cors);

    if !cors.expose_headers.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&cors.expose_headers.join(", ")) {
            headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, value);
        }
    }
}

/// The synthetic no-body preflight response.
pub fn preflight(origin: Option<&str>, cors: &CorsConfig) -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    base_headers(response.headers_mut(), origin, cors);
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(cors.max_age));
    response
}

/// Quota headers stamped on admitted responses; the expose list makes
/// them readable from browser scripts.
pub fn rate_limit_headers(headers: &mut HeaderMap, limit: i64, remaining: i64) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limit.max(0)));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining.max(0)));
}

fn base_headers(headers: &mut HeaderMap, origin: Option<&str>, cors: &CorsConfig) {
    if let Some(origin) = origin {
        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
    }
    // Responses vary by the echoed origin; keep shared caches honest.
    headers.append(VARY, HeaderValue::from_static("Origin"));

    if let Ok(value) = HeaderValue::from_str(&cors.allow_methods) {
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value);
    }
    if let Ok(value) = HeaderValue::from_str(&cors.allow_headers) {
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, value);
    }
    if cors.allow_credentials {
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}
