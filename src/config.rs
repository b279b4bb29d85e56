use url::Url;

/// Where to look for the caller's token, tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// `Authorization: Bearer <token>` header.
    Bearer,
    /// A named query parameter, e.g. `?token=...`.
    Query(String),
}

impl TokenSource {
    /// Parse a single config entry: `bearer` or `query:<param>`.
    pub fn parse(entry: &str) -> Option<TokenSource> {
        let entry = entry.trim();
        if entry.eq_ignore_ascii_case("bearer") {
            return Some(TokenSource::Bearer);
        }
        if let Some(param) = entry.strip_prefix("query:") {
            let param = param.trim();
            if !param.is_empty() {
                return Some(TokenSource::Query(param.to_string()));
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct BlockResponseConfig {
    /// Optional override for the human-readable message on every block.
    /// When unset, each block reason carries its own message.
    pub message: Option<String>,
    /// HTTP status used for all block responses.
    pub status: u16,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allow_credentials: bool,
    /// Preflight cache duration in seconds.
    pub max_age: u64,
    pub allow_methods: String,
    pub allow_headers: String,
    pub expose_headers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// The service's own canonical URL, for the same-origin check.
    pub base_url: Url,
    /// Quota applied to tokens without an explicit max_requests.
    pub default_max_requests: i64,
    pub token_sources: Vec<TokenSource>,
    pub block_response: BlockResponseConfig,
    pub cors: CorsConfig,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let base_url = std::env::var("TOLLGATE_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:8080".into());
    let base_url: Url = base_url
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid TOLLGATE_BASE_URL '{}': {}", base_url, e))?;
    if base_url.host_str().is_none() {
        anyhow::bail!("TOLLGATE_BASE_URL must include a host");
    }

    let token_sources = std::env::var("TOLLGATE_TOKEN_SOURCES")
        .unwrap_or_else(|_| "bearer,query:token,query:api_token".into())
        .split(',')
        .filter_map(TokenSource::parse)
        .collect::<Vec<_>>();
    if token_sources.is_empty() {
        anyhow::bail!("TOLLGATE_TOKEN_SOURCES contains no valid entries");
    }

    Ok(Config {
        port: std::env::var("TOLLGATE_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/tollgate".into()),
        base_url,
        default_max_requests: std::env::var("TOLLGATE_DEFAULT_MAX_REQUESTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000),
        token_sources,
        block_response: BlockResponseConfig {
            message: std::env::var("TOLLGATE_BLOCK_MESSAGE").ok(),
            status: std::env::var("TOLLGATE_BLOCK_STATUS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(429),
        },
        cors: CorsConfig {
            allow_credentials: std::env::var("TOLLGATE_CORS_ALLOW_CREDENTIALS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            max_age: std::env::var("TOLLGATE_CORS_MAX_AGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400),
            allow_methods: std::env::var("TOLLGATE_CORS_ALLOW_METHODS")
                .unwrap_or_else(|_| "GET, POST, PUT, DELETE, OPTIONS".into()),
            allow_headers: std::env::var("TOLLGATE_CORS_ALLOW_HEADERS")
                .unwrap_or_else(|_| "Authorization, Content-Type".into()),
            expose_headers: std::env::var("TOLLGATE_CORS_EXPOSE_HEADERS")
                .unwrap_or_else(|_| "X-RateLimit-Limit,X-RateLimit-Remaining".into())
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        },
    })
}
