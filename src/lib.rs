//! Tollgate — cross-origin admission guard with per-token quotas.
//!
//! Same-origin traffic passes untouched; cross-origin callers must present
//! a known token, call from an origin the token allows, and stay within
//! the token's request quota. Admitted and blocked responses both carry
//! CORS headers. Host applications wrap their router with [`protect`];
//! the binary offers the same guard around a demo API plus a token
//! lifecycle CLI.

use std::sync::Arc;

use axum::Router;

pub mod clock;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod origin;
pub mod store;

use clock::Clock;
use config::Config;
use store::TokenStore;

/// Shared application state passed to the guard middleware.
pub struct AppState {
    pub store: Arc<dyn TokenStore>,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn TokenStore>, config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }
}

/// Wrap a router in the admission guard.
///
/// Routes that must stay reachable without a token (health checks and the
/// like) belong on a sibling router merged in after this call.
pub fn protect(state: Arc<AppState>, inner: Router) -> Router {
    inner.layer(axum::middleware::from_fn_with_state(
        state,
        middleware::admission::guard,
    ))
}
