use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Json;
use clap::Parser;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tollgate::clock::SystemClock;
use tollgate::config::{self, Config};
use tollgate::models::token::NewApiToken;
use tollgate::store::postgres::PgStore;
use tollgate::store::StatusFilter;
use tollgate::{protect, AppState};

mod cli;

/// Length of generated token secrets.
const TOKEN_LENGTH: usize = 40;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tollgate=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Token { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            handle_token_command(&db, &cfg, command).await
        }
        None => run_server(cfg, None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(cfg.port);

    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let state = Arc::new(AppState::new(Arc::new(db), cfg, Arc::new(SystemClock)));

    let app = axum::Router::new()
        // Health endpoint stays outside the guard
        .route("/healthz", get(|| async { "ok" }))
        .merge(protect(state, demo_router()))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("tollgate listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// A minimal protected API for smoke-testing the guard. Host applications
/// embed the guard around their own routers via `tollgate::protect`.
fn demo_router() -> axum::Router {
    axum::Router::new().route(
        "/api/ping",
        get(|| async { Json(serde_json::json!({ "message": "pong" })) }),
    )
}

async fn handle_token_command(
    db: &PgStore,
    cfg: &Config,
    cmd: cli::TokenCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Create { origins, max, name } => {
            if let Some(max) = max {
                if max < 0 {
                    anyhow::bail!("--max must be non-negative");
                }
            }
            let origins = if origins.is_empty() {
                vec!["*".to_string()]
            } else {
                origins
            };

            let new = NewApiToken {
                token: generate_token(),
                name,
                allowed_origins: origins,
                max_requests: max,
            };
            let created = db.insert_token(&new).await?;

            println!("Token created:");
            println!("  Token:           {}", created.token);
            match created.max_requests {
                Some(max) => println!("  Max requests:    {}", max),
                None => println!(
                    "  Max requests:    {} (default)",
                    cfg.default_max_requests
                ),
            }
            println!(
                "  Allowed origins: {}",
                created.allowed_origins.join(", ")
            );
            if let Some(name) = &created.name {
                println!("  Name:            {}", name);
            }
            println!();
            println!("Save this token now; it cannot be retrieved later.");
        }

        cli::TokenCommands::List { status, limit } => {
            let filter = match status.as_str() {
                "all" => StatusFilter::All,
                "active" => StatusFilter::Active,
                "blocked" => StatusFilter::Blocked,
                other => anyhow::bail!(
                    "invalid --status: {}. Must be active, blocked, or all",
                    other
                ),
            };

            let tokens = db.list_tokens(filter, limit).await?;
            let counts = db.token_counts().await?;

            println!(
                "Tokens (showing {} of {}) — active: {}, blocked: {}",
                tokens.len(),
                counts.total,
                counts.active,
                counts.blocked
            );

            if tokens.is_empty() {
                println!("No tokens found.");
                return Ok(());
            }

            println!(
                "{:<20} {:<18} {:<10} {:<14} {:<18} CREATED",
                "NAME", "TOKEN", "STATUS", "USAGE", "LAST USED"
            );
            for t in tokens {
                let truncated = format!("{}...", t.token.chars().take(12).collect::<String>());
                let status = if t.is_blocked() { "blocked" } else { "active" };
                let usage = format!(
                    "{}/{}",
                    t.requests_count,
                    t.effective_max(cfg.default_max_requests)
                );
                let last_used = t
                    .last_request_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".into());

                println!(
                    "{:<20} {:<18} {:<10} {:<14} {:<18} {}",
                    t.name.as_deref().unwrap_or("-"),
                    truncated,
                    status,
                    usage,
                    last_used,
                    t.created_at.format("%Y-%m-%d")
                );
            }
        }

        cli::TokenCommands::Block { token, reason } => {
            if db.block_token(&token, reason.as_deref()).await? {
                println!("Token blocked.");
                if let Some(reason) = reason {
                    println!("Reason: {}", reason);
                }
            } else {
                anyhow::bail!("token not found");
            }
        }

        cli::TokenCommands::Unblock { token, max, reason } => {
            let max = max.unwrap_or(cfg.default_max_requests);
            if max < 0 {
                anyhow::bail!("--max must be non-negative");
            }
            if db.unblock_token(&token, max, reason.as_deref()).await? {
                println!("Token unblocked. New max requests: {}", max);
            } else {
                anyhow::bail!("token not found");
            }
        }

        cli::TokenCommands::Reset { token, all, yes } => match token {
            Some(token) => {
                if db.reset_usage(&token).await? {
                    println!("Usage reset.");
                } else {
                    anyhow::bail!("token not found");
                }
            }
            None if all => {
                if !yes {
                    anyhow::bail!("resetting every token requires --yes");
                }
                let affected = db.reset_all().await?;
                println!("Usage reset for {} tokens.", affected);
            }
            None => anyhow::bail!("pass --token <token> or --all"),
        },
    }

    Ok(())
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
