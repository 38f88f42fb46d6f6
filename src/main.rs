use anyhow::Result;
use clap::{Parser, Subcommand};
use forms_rs::{
    auth::{parse_expiry, NewApiKey, DEFAULT_TOKEN_EXPIRY},
    config::{SecurityConfig, DEFAULT_LOG_DIR},
    init_env,
    utils::logger,
    AppContext,
};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "forms-rs", about = "API key and token service for the forms backend")]
struct Cli {
    /// Overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Overrides BIND_ADDR
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Create an API key and print its plaintext once
    CreateKey {
        #[arg(long)]
        name: String,
        #[arg(long = "permission")]
        permissions: Vec<String>,
        #[arg(long)]
        rate_limit: Option<i32>,
        #[arg(long, default_value = "cli")]
        created_by: String,
    },
    ListKeys {
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long)]
        offset: Option<u64>,
    },
    DeactivateKey { id: String },
    DeleteKey { id: String },
    /// Sign a token over a JSON claims payload
    IssueToken {
        #[arg(long)]
        claims: String,
        #[arg(long, default_value = DEFAULT_TOKEN_EXPIRY)]
        expiry: String,
    },
    VerifyToken { token: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_env();
    let cli = Cli::parse();

    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string());
    let _guard = logger::init(log_dir)?;

    let mut config = SecurityConfig::from_env()?;
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }
    ensure_sqlite_dir(&config.database_url)?;

    info!("Initializing security service...");
    let ctx = Arc::new(AppContext::from_config(&config).await?);
    let security = &ctx.security;

    match cli.command {
        Command::Serve { bind } => {
            let addr = bind.unwrap_or(config.bind_addr);
            if let Err(e) = forms_rs::web::start_server(ctx.clone(), addr).await {
                error!("Server error: {}", e);
                return Err(e);
            }
            info!("Server stopped gracefully");
        }
        Command::CreateKey { name, permissions, rate_limit, created_by } => {
            let mut new_key = NewApiKey::new(name, permissions, created_by);
            new_key.rate_limit_per_hour = rate_limit;
            let (key, record) = security.create_api_key(new_key).await?;
            println!("id:  {}", record.id);
            println!("key: {}", key);
            println!("Store this key now; it cannot be shown again.");
        }
        Command::ListKeys { limit, offset } => {
            let keys = security.list_api_keys(limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&keys)?);
        }
        Command::DeactivateKey { id } => {
            let affected = security.deactivate_api_key(&id).await?;
            println!("{}", if affected { "deactivated" } else { "not found" });
        }
        Command::DeleteKey { id } => {
            let affected = security.delete_api_key(&id).await?;
            println!("{}", if affected { "deleted" } else { "not found" });
        }
        Command::IssueToken { claims, expiry } => {
            let claims: serde_json::Value = serde_json::from_str(&claims)?;
            let token = security.issue_token_with_expiry(&claims, parse_expiry(&expiry)?)?;
            println!("{}", token);
        }
        Command::VerifyToken { token } => match security.verify_token::<serde_json::Value>(&token) {
            Some(claims) => println!("{}", serde_json::to_string_pretty(&claims)?),
            None => anyhow::bail!("invalid or expired token"),
        },
    }

    Ok(())
}

/// Creates the parent directory of a file-backed SQLite URL.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(path) = database_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = path.trim_start_matches("//");
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
