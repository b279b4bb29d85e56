use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::token::{ApiToken, NewApiToken};
use crate::store::{StatusFilter, TokenStore};

const SELECT_COLUMNS: &str = "id, token, name, allowed_origins, max_requests, requests_count, \
     last_request_at, block_reason, unblock_reason, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Aggregate counts shown by `token list`.
#[derive(Debug, Clone, Copy)]
pub struct TokenCounts {
    pub total: i64,
    pub active: i64,
    pub blocked: i64,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- Administrative Operations (CLI only, never the request path) --

    pub async fn insert_token(&self, new: &NewApiToken) -> anyhow::Result<ApiToken> {
        let row = sqlx::query_as::<_, ApiToken>(
            r#"INSERT INTO api_tokens (token, name, allowed_origins, max_requests)
               VALUES ($1, $2, $3, $4)
               RETURNING id, token, name, allowed_origins, max_requests, requests_count,
                         last_request_at, block_reason, unblock_reason, created_at"#,
        )
        .bind(&new.token)
        .bind(&new.name)
        .bind(&new.allowed_origins)
        .bind(new.max_requests)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_tokens(
        &self,
        filter: StatusFilter,
        limit: i64,
    ) -> anyhow::Result<Vec<ApiToken>> {
        let query = match filter {
            StatusFilter::All => format!(
                "SELECT {SELECT_COLUMNS} FROM api_tokens ORDER BY created_at DESC LIMIT $1"
            ),
            StatusFilter::Active => format!(
                "SELECT {SELECT_COLUMNS} FROM api_tokens \
                 WHERE max_requests IS NULL OR max_requests > 0 \
                 ORDER BY created_at DESC LIMIT $1"
            ),
            StatusFilter::Blocked => format!(
                "SELECT {SELECT_COLUMNS} FROM api_tokens \
                 WHERE max_requests = 0 ORDER BY created_at DESC LIMIT $1"
            ),
        };

        let rows = sqlx::query_as::<_, ApiToken>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn token_counts(&self) -> anyhow::Result<TokenCounts> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM api_tokens")
            .fetch_one(&self.pool)
            .await?;
        let blocked =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM api_tokens WHERE max_requests = 0")
                .fetch_one(&self.pool)
                .await?;

        Ok(TokenCounts {
            total,
            active: total - blocked,
            blocked,
        })
    }

    /// Block a token by setting the `max_requests = 0` sentinel.
    pub async fn block_token(&self, token: &str, reason: Option<&str>) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE api_tokens SET max_requests = 0, block_reason = $2 WHERE token = $1",
        )
        .bind(token)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Restore a blocked token's quota and record why.
    pub async fn unblock_token(
        &self,
        token: &str,
        max_requests: i64,
        reason: Option<&str>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE api_tokens \
             SET max_requests = $2, block_reason = NULL, unblock_reason = $3 \
             WHERE token = $1",
        )
        .bind(token)
        .bind(max_requests)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Zero one token's usage counter and last-used timestamp.
    pub async fn reset_usage(&self, token: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE api_tokens SET requests_count = 0, last_request_at = NULL WHERE token = $1",
        )
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Zero every token's usage counter. Returns how many rows changed.
    pub async fn reset_all(&self) -> anyhow::Result<u64> {
        let result =
            sqlx::query("UPDATE api_tokens SET requests_count = 0, last_request_at = NULL")
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn find_by_token(&self, value: &str) -> anyhow::Result<Option<ApiToken>> {
        let row = sqlx::query_as::<_, ApiToken>(
            "SELECT id, token, name, allowed_origins, max_requests, requests_count, \
             last_request_at, block_reason, unblock_reason, created_at \
             FROM api_tokens WHERE token = $1",
        )
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn try_admit(
        &self,
        id: Uuid,
        effective_max: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<i64>> {
        // Quota comparison and increment in one statement: the WHERE clause
        // re-reads requests_count under the row lock, so N concurrent
        // admissions can never push the count past effective_max.
        let new_count = sqlx::query_scalar::<_, i64>(
            "UPDATE api_tokens \
             SET requests_count = requests_count + 1, last_request_at = $3 \
             WHERE id = $1 AND requests_count < $2 \
             RETURNING requests_count",
        )
        .bind(id)
        .bind(effective_max)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(new_count)
    }
}
