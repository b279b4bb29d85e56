//! The admission guard: decides, per request, whether a cross-origin
//! caller gets through to the protected handler.
//!
//! Same-origin and header-less requests bypass every check. Cross-origin
//! requests pass four hard gates in order — token extraction, token
//! resolution, origin pattern match, quota check-and-increment — failing
//! closed at the first gate that rejects. `OPTIONS` preflights are
//! answered directly with a synthetic 204 and never reach the gates:
//! browsers don't attach credentials to preflights, so gating them would
//! always fail.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, ORIGIN};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::clock::Clock;
use crate::config::{Config, TokenSource};
use crate::errors::{BlockReason, GuardError};
use crate::middleware::cors;
use crate::origin::{self, OriginClass};
use crate::store::TokenStore;
use crate::AppState;

/// Outcome of the four-gate evaluation for a cross-origin request.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Admit { limit: i64, remaining: i64 },
    Block(BlockReason),
}

/// Axum middleware entry point. Wire it with
/// `axum::middleware::from_fn_with_state(state, guard)`.
pub async fn guard(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let origin_header = req
        .headers()
        .get(ORIGIN)
        .map(|v| v.to_str().unwrap_or("").to_string());
    let class = origin::classify(origin_header.as_deref(), &state.config.base_url);
    let preflight = req.method() == Method::OPTIONS;

    match class {
        // Trusted traffic: admit unconditionally, short-circuiting preflights.
        OriginClass::NoOrigin | OriginClass::SameOrigin => {
            if preflight {
                return cors::preflight(origin_header.as_deref(), &state.config.cors);
            }
            let mut response = next.run(req).await;
            if origin_header.is_some() {
                cors::apply(
                    response.headers_mut(),
                    origin_header.as_deref(),
                    &state.config.cors,
                );
            }
            response
        }

        OriginClass::CrossOrigin => {
            // classify() only returns CrossOrigin for a present header
            let origin = origin_header.unwrap_or_default();
            if preflight {
                return cors::preflight(Some(&origin), &state.config.cors);
            }

            let outcome = evaluate(&state, &origin, req.headers(), req.uri().query()).await;
            match outcome {
                Ok(Admission::Admit { limit, remaining }) => {
                    let mut response = next.run(req).await;
                    cors::apply(response.headers_mut(), Some(&origin), &state.config.cors);
                    cors::rate_limit_headers(response.headers_mut(), limit, remaining);
                    response
                }
                Ok(Admission::Block(reason)) => {
                    tracing::warn!(
                        origin = %origin,
                        error_code = reason.error_code(),
                        "blocked cross-origin request"
                    );
                    block_response(&state.config, &origin, reason)
                }
                Err(e) => {
                    // Infrastructure fault: 5xx, with CORS headers so the
                    // caller can still read it. Quota untouched.
                    let mut response = e.into_response();
                    cors::apply(response.headers_mut(), Some(&origin), &state.config.cors);
                    response
                }
            }
        }
    }
}

/// Run the four gates for a cross-origin, non-preflight request.
///
/// Gates 1–3 are read-only; gate 4's atomic check-and-increment is the
/// only persistent mutation on the request path.
pub async fn evaluate(
    state: &AppState,
    origin: &str,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<Admission, GuardError> {
    // -- 1. Token extraction --
    let Some(value) = extract_token(&state.config.token_sources, headers, query) else {
        return Ok(Admission::Block(BlockReason::MissingToken));
    };

    // -- 2. Token resolution --
    let Some(token) = state
        .store
        .find_by_token(&value)
        .await
        .map_err(GuardError::Internal)?
    else {
        return Ok(Admission::Block(BlockReason::InvalidToken));
    };

    // -- 3. Origin pattern match --
    if !origin_allowed(origin, &token.allowed_origins) {
        return Ok(Admission::Block(BlockReason::OriginNotAllowed));
    }

    // -- 4. Quota check-and-increment --
    let limit = token.effective_max(state.config.default_max_requests);
    match state
        .store
        .try_admit(token.id, limit, state.clock.now())
        .await
        .map_err(GuardError::Internal)?
    {
        Some(new_count) => Ok(Admission::Admit {
            limit,
            remaining: limit - new_count,
        }),
        None => Ok(Admission::Block(BlockReason::LimitExceeded)),
    }
}

/// Search the configured sources in priority order; first non-empty wins.
fn extract_token(
    sources: &[TokenSource],
    headers: &HeaderMap,
    query: Option<&str>,
) -> Option<String> {
    sources.iter().find_map(|source| match source {
        TokenSource::Bearer => bearer_token(headers),
        TokenSource::Query(param) => query_param(query, param),
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn query_param(query: Option<&str>, param: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, value)| key.as_ref() == param && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Test the origin against each pattern in order, stopping at the first
/// match. `*` matches anything; otherwise the pattern is compiled with
/// every regex metacharacter escaped except `*`, which becomes "any
/// substring", anchored over the whole origin and case-insensitive. An
/// empty pattern list matches nothing.
fn origin_allowed(origin: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        if pattern == "*" || pattern == origin {
            return true;
        }
        let escaped = regex::escape(pattern).replace(r"\*", ".*");
        regex::RegexBuilder::new(&format!("^{escaped}$"))
            .case_insensitive(true)
            .size_limit(1_000_000) // bound user-supplied patterns
            .build()
            .map(|re| re.is_match(origin))
            .unwrap_or(false)
    })
}

fn block_response(config: &Config, origin: &str, reason: BlockReason) -> Response {
    let status = StatusCode::from_u16(config.block_response.status)
        .unwrap_or(StatusCode::TOO_MANY_REQUESTS);
    let message = config
        .block_response
        .message
        .as_deref()
        .unwrap_or_else(|| reason.message());

    let body = Json(json!({
        "message": message,
        "error_code": reason.error_code(),
    }));

    let mut response = (status, body).into_response();
    cors::apply(response.headers_mut(), Some(origin), &config.cors);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn sources() -> Vec<TokenSource> {
        vec![
            TokenSource::Bearer,
            TokenSource::Query("token".into()),
            TokenSource::Query("api_token".into()),
        ]
    }

    fn auth_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    // ── Token extraction ─────────────────────────────────────

    #[test]
    fn test_bearer_header_wins_over_query() {
        let headers = auth_headers("Bearer secret-a");
        let token = extract_token(&sources(), &headers, Some("token=secret-b"));
        assert_eq!(token, Some("secret-a".into()));
    }

    #[test]
    fn test_query_fallback_in_configured_order() {
        let headers = HeaderMap::new();
        let token = extract_token(&sources(), &headers, Some("api_token=late&token=early"));
        assert_eq!(token, Some("early".into()));

        let token = extract_token(&sources(), &headers, Some("api_token=only"));
        assert_eq!(token, Some("only".into()));
    }

    #[test]
    fn test_empty_values_are_skipped() {
        // An empty bearer value must not shadow a usable query parameter
        let headers = auth_headers("Bearer ");
        let token = extract_token(&sources(), &headers, Some("token=fallback"));
        assert_eq!(token, Some("fallback".into()));

        let headers = HeaderMap::new();
        assert_eq!(extract_token(&sources(), &headers, Some("token=")), None);
        assert_eq!(extract_token(&sources(), &headers, None), None);
    }

    #[test]
    fn test_non_bearer_authorization_is_ignored() {
        let headers = auth_headers("Basic dXNlcjpwYXNz");
        assert_eq!(extract_token(&sources(), &headers, None), None);
    }

    #[test]
    fn test_query_value_is_url_decoded() {
        let headers = HeaderMap::new();
        let token = extract_token(&sources(), &headers, Some("token=a%2Bb"));
        assert_eq!(token, Some("a+b".into()));
    }

    // ── Origin pattern matching ──────────────────────────────

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_pattern_list_denies() {
        assert!(!origin_allowed("https://app.io", &[]));
    }

    #[test]
    fn test_star_matches_anything() {
        assert!(origin_allowed("https://anything.example", &patterns(&["*"])));
    }

    #[test]
    fn test_exact_match() {
        let p = patterns(&["https://app.io"]);
        assert!(origin_allowed("https://app.io", &p));
        assert!(!origin_allowed("https://app.io.evil.com", &p));
    }

    #[test]
    fn test_wildcard_subdomain() {
        let p = patterns(&["https://*.example.com"]);
        assert!(origin_allowed("https://a.example.com", &p));
        assert!(origin_allowed("https://deep.nested.example.com", &p));
        // the apex has no subdomain segment to substitute
        assert!(!origin_allowed("https://example.com", &p));
    }

    #[test]
    fn test_dots_are_literal() {
        // An unescaped '.' would let 'x' stand in for the dot
        let p = patterns(&["https://a.example.com"]);
        assert!(!origin_allowed("https://axexample.com", &p));
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let p = patterns(&["https://*.Example.COM"]);
        assert!(origin_allowed("https://a.example.com", &p));
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let p = patterns(&["https://nope.io", "https://*.app.io"]);
        assert!(origin_allowed("https://web.app.io", &p));
    }

    #[test]
    fn test_match_is_anchored() {
        let p = patterns(&["https://app.io"]);
        assert!(!origin_allowed("xhttps://app.io", &p));
        assert!(!origin_allowed("https://app.iox", &p));
    }
}
