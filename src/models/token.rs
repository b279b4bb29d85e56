use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored API token record.
///
/// Plain data only. Admission reads it; every mutation goes through the
/// store (`try_admit` on the request path, admin operations elsewhere).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiToken {
    pub id: Uuid,
    /// Opaque secret, looked up verbatim and case-sensitive.
    pub token: String,
    pub name: Option<String>,
    /// Origin patterns this token may call from. Empty denies all
    /// cross-origin use.
    pub allowed_origins: Vec<String>,
    /// Per-token quota. `None` falls back to the configured default;
    /// `0` means blocked.
    pub max_requests: Option<i64>,
    pub requests_count: i64,
    /// Set on each admitted cross-origin request, cleared by a reset.
    pub last_request_at: Option<DateTime<Utc>>,
    pub block_reason: Option<String>,
    pub unblock_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ApiToken {
    /// The quota actually enforced for this token.
    pub fn effective_max(&self, default_max: i64) -> i64 {
        self.max_requests.unwrap_or(default_max)
    }

    /// Blocked tokens carry the `max_requests = 0` sentinel.
    pub fn is_blocked(&self) -> bool {
        self.max_requests == Some(0)
    }
}

/// Fields for inserting a freshly issued token.
#[derive(Debug)]
pub struct NewApiToken {
    pub token: String,
    pub name: Option<String>,
    pub allowed_origins: Vec<String>,
    pub max_requests: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(max: Option<i64>) -> ApiToken {
        ApiToken {
            id: Uuid::new_v4(),
            token: "t".into(),
            name: None,
            allowed_origins: vec!["*".into()],
            max_requests: max,
            requests_count: 0,
            last_request_at: None,
            block_reason: None,
            unblock_reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_effective_max_falls_back_to_default() {
        assert_eq!(token(None).effective_max(1000), 1000);
        assert_eq!(token(Some(5)).effective_max(1000), 5);
        assert_eq!(token(Some(0)).effective_max(1000), 0);
    }

    #[test]
    fn test_blocked_sentinel() {
        assert!(token(Some(0)).is_blocked());
        assert!(!token(Some(1)).is_blocked());
        assert!(!token(None).is_blocked());
    }
}
