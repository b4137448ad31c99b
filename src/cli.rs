use clap::{Parser, Subcommand};

/// Tokengate — time-bounded bearer token issuance and validation
#[derive(Parser)]
#[command(name = "tokengate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the validation endpoint and run the expiry sweep
    Serve {
        /// Port to bind (overrides TOKENGATE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the Telegram admin bot and the expiry sweep
    Bot,

    /// Manage tokens directly against the store
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Ask a running validation endpoint about a token
    Check {
        token: String,
        #[arg(long, default_value = "http://127.0.0.1:1830")]
        url: String,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a new token
    Create {
        /// Time-to-live in seconds
        #[arg(long, allow_negative_numbers = true)]
        ttl: i64,
        /// Client address to record with the token
        #[arg(long)]
        bound_address: Option<String>,
    },
    /// List all tokens (secrets masked)
    List,
    /// Delete expired tokens now
    Sweep,
}
