pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::token::ApiToken;

/// Status filter for administrative listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Active,
    Blocked,
}

/// The two operations the admission path needs from storage.
///
/// Administrative operations (issue, block, reset, ...) are deliberately
/// not part of this trait; they live on the concrete store and are only
/// reached from the CLI.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Exact, case-sensitive lookup by secret value.
    async fn find_by_token(&self, value: &str) -> anyhow::Result<Option<ApiToken>>;

    /// Atomically admit one request against a token's quota.
    ///
    /// The comparison against `effective_max` and the increment of
    /// `requests_count` (plus the `last_request_at` stamp) happen as one
    /// unit per token, so concurrent callers can never over-admit.
    /// Returns the new count, or `None` when the quota is exhausted (in
    /// which case nothing was mutated).
    async fn try_admit(
        &self,
        id: Uuid,
        effective_max: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<i64>>;
}
