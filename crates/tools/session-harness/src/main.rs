//! CLI harness for exercising the session cache against an on-disk store
//!
//! This tool allows testing:
//! - Login persistence with live or canned permission lists
//! - Read-only session display, restore with activity tracking and idle expiry
//! - Logout cleanup, including chunk items
//! - Inspection of the raw key layout

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crm_api::{ApiConfig, HttpPermissionClient, PermissionSource, StaticPermissions};
use crm_session::{SessionCache, SessionConfig, SessionRecord, UserProfile};
use crm_storage::{
    ChunkedStore, SecureStore, SqliteSecureStore, StoreConfig, CHUNK_COUNT_SUFFIX, CHUNK_ITEM_INFIX,
};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

/// Environment variable holding the store passphrase
const PASSPHRASE_ENV: &str = "CRM_STORE_PASSPHRASE";

#[derive(Parser)]
#[command(name = "session-harness")]
#[command(about = "CRM session storage harness", long_about = None)]
struct Cli {
    /// Encrypted store file
    #[arg(short, long, default_value = "crm-secure-store.db")]
    store: PathBuf,

    /// Store passphrase (falls back to CRM_STORE_PASSPHRASE)
    #[arg(short, long)]
    passphrase: Option<String>,

    /// Chunk threshold in bytes
    #[arg(long, default_value = "2000")]
    chunk_size: usize,

    /// Idle timeout in seconds applied on restore
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Backend base URL (falls back to CRM_API_BASE_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Use empty permission lists instead of calling the backend
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persist a session for a user profile
    Login {
        /// User profile JSON file (login response `user` object)
        #[arg(short, long)]
        user: PathBuf,

        /// Bearer token
        #[arg(short, long)]
        token: String,
    },

    /// Print the stored session without touching it
    Show,

    /// Restore the session as on app resume (idle check, then touch)
    Restore,

    /// Record activity now
    Touch,

    /// Re-fetch permission lists for the stored session
    Refresh,

    /// Erase the stored session
    Logout,

    /// List raw store keys and their layout
    Inspect,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let passphrase = match cli.passphrase.clone() {
        Some(passphrase) => passphrase,
        None => std::env::var(PASSPHRASE_ENV)
            .with_context(|| format!("Pass --passphrase or set {}", PASSPHRASE_ENV))?,
    };
    let store_config = StoreConfig {
        chunk_size: cli.chunk_size,
        ..Default::default()
    };
    let store = SqliteSecureStore::open_with_passphrase(&cli.store, &passphrase, &store_config)
        .with_context(|| format!("Failed to open store {}", cli.store.display()))?;
    let codec = ChunkedStore::with_chunk_size(store, store_config.chunk_size)?;
    let session_config = SessionConfig {
        idle_timeout_secs: cli.idle_timeout,
    };

    if cli.offline {
        let cache = SessionCache::with_codec(codec, StaticPermissions::empty(), session_config);
        run(&cache, cli.command).await
    } else {
        let mut api_config = ApiConfig::from_env();
        if let Some(url) = cli.api_url {
            api_config.base_url = url;
        }
        info!("Using backend {}", api_config.base_url);
        let client = HttpPermissionClient::new(api_config)?;
        let cache = SessionCache::with_codec(codec, client, session_config);
        run(&cache, cli.command).await
    }
}

async fn run<P: PermissionSource>(
    cache: &SessionCache<SqliteSecureStore, P>,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Login { user, token } => {
            let raw = std::fs::read_to_string(&user)
                .with_context(|| format!("Failed to read {}", user.display()))?;
            let profile = UserProfile::from_value(serde_json::from_str(&raw)?)
                .context("User JSON must contain at least `id` and `role`")?;
            cache.save_session(&profile, &token).await?;
            println!("✅ Session saved for {} user {:?}", profile.role, profile.user_id());
        }
        Commands::Show => print_session(cache.load_session().await)?,
        Commands::Restore => print_session(cache.restore_session().await)?,
        Commands::Touch => {
            if cache.load_session().await.is_none() {
                bail!("No active session");
            }
            cache.touch().await?;
            println!("✅ Activity recorded");
        }
        Commands::Refresh => {
            cache.refresh_permissions().await?;
            println!("✅ Permissions refreshed");
        }
        Commands::Logout => {
            cache.clear_session().await?;
            println!("✅ Session cleared");
        }
        Commands::Inspect => inspect(cache.store()).await?,
    }
    Ok(())
}

fn print_session(record: Option<SessionRecord>) -> anyhow::Result<()> {
    let Some(record) = record else {
        println!("No active session");
        return Ok(());
    };
    let summary = json!({
        "token": "<redacted>",
        "role": record.role,
        "user_id": record.user_id,
        "student_id": record.student_id,
        "counselor_id": record.counselor_id,
        "last_active_at": record.last_active_at,
        "user": record.user,
        "permissions": record.permissions,
        "user_permissions": record.user_permissions,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn inspect(store: &SqliteSecureStore) -> anyhow::Result<()> {
    let keys = store.keys()?;
    if keys.is_empty() {
        println!("Store is empty");
        return Ok(());
    }

    for key in keys {
        let value = store.get(&key).await?.unwrap_or_default();
        if key.ends_with(CHUNK_COUNT_SUFFIX) {
            println!("{:<32} control  {} chunks", key, value);
        } else if key.contains(CHUNK_ITEM_INFIX) {
            println!("{:<32} chunk    {} bytes", key, value.len());
        } else {
            println!("{:<32} item     {} bytes", key, value.len());
        }
        if value.len() > store.item_limit().unwrap_or(usize::MAX) {
            warn!("{} exceeds the item limit", key);
        }
    }
    Ok(())
}
