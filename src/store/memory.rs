//! In-memory token store for tests and local development.
//!
//! Shares the atomicity contract of the Postgres store: `try_admit` holds
//! the map lock across the quota comparison and the increment.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::token::ApiToken;
use crate::store::TokenStore;

#[derive(Default)]
pub struct MemoryStore {
    tokens: Mutex<HashMap<Uuid, ApiToken>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: ApiToken) {
        self.tokens.lock().unwrap().insert(token.id, token);
    }

    pub fn get(&self, id: Uuid) -> Option<ApiToken> {
        self.tokens.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn find_by_token(&self, value: &str) -> anyhow::Result<Option<ApiToken>> {
        let tokens = self.tokens.lock().unwrap();
        Ok(tokens.values().find(|t| t.token == value).cloned())
    }

    async fn try_admit(
        &self,
        id: Uuid,
        effective_max: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<i64>> {
        let mut tokens = self.tokens.lock().unwrap();
        let record = tokens
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown token id: {}", id))?;

        if record.requests_count >= effective_max {
            return Ok(None);
        }
        record.requests_count += 1;
        record.last_request_at = Some(now);
        Ok(Some(record.requests_count))
    }
}
