//! Larkspur CLI - session store setup and callback token inspection.
//!
//! # Usage
//!
//! ```bash
//! # Create the session table in the storefront database
//! larkspur-cli migrate sessions
//!
//! # Show what the storefront would do with a callback token
//! larkspur-cli token inspect eyJhbGciOi...
//! ```
//!
//! # Commands
//!
//! - `migrate sessions` - Create the `tower-sessions` table
//! - `token inspect` - Decode a callback token and show tenant routing

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "larkspur-cli")]
#[command(author, version, about = "Larkspur CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Inspect shopper-login tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Create the session store table
    Sessions,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Print a token's unverified claims and the key set it would be checked against
    Inspect {
        /// Compact token, e.g. the `x-slas-callback-token` header value
        token: String,

        /// Organization ID the storefront is configured for (`f_ecom_<tenant>`)
        #[arg(long, env = "COMMERCE_API_ORGANIZATION_ID")]
        organization_id: String,

        /// Commerce platform short code
        #[arg(long, env = "COMMERCE_API_SHORT_CODE")]
        short_code: String,

        /// Public origin of the storefront
        #[arg(long, env = "STOREFRONT_BASE_URL", default_value = "http://localhost:3000")]
        base_url: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate { target } => match target {
            MigrateTarget::Sessions => commands::migrate::sessions().await?,
        },
        Commands::Token { action } => match action {
            TokenAction::Inspect {
                token,
                organization_id,
                short_code,
                base_url,
            } => {
                commands::token::inspect(&token, &organization_id, &short_code, &base_url)?;
            }
        },
    }
    Ok(())
}
