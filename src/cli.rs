use clap::{Parser, Subcommand};

/// Tollgate — cross-origin admission guard with per-token quotas
#[derive(Parser)]
#[command(name = "tollgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the guard server
    Serve {
        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage API tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a new token
    Create {
        /// Origin patterns allowed to use the token (repeatable)
        #[arg(long = "origins", value_delimiter = ',')]
        origins: Vec<String>,
        /// Request quota; omit to use the configured default
        #[arg(long)]
        max: Option<i64>,
        /// Descriptive name
        #[arg(long)]
        name: Option<String>,
    },
    /// List tokens with status and usage
    List {
        /// Filter: active, blocked, or all
        #[arg(long, default_value = "all")]
        status: String,
        /// Number of tokens to display
        #[arg(long, default_value = "10")]
        limit: i64,
    },
    /// Block a token (sets its quota to 0)
    Block {
        /// The token secret to block
        token: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Unblock a token and restore its quota
    Unblock {
        /// The token secret to unblock
        token: String,
        /// New quota; omit to use the configured default
        #[arg(long)]
        max: Option<i64>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Zero usage counters for one token or all of them
    Reset {
        /// Reset this token only
        #[arg(long)]
        token: Option<String>,
        /// Reset every token
        #[arg(long)]
        all: bool,
        /// Skip the confirmation for --all
        #[arg(long)]
        yes: bool,
    },
}
