#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::Parser;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use wallet_rs::storage::key::sqlite::SqliteKeyStorage;
use wallet_rs::storage::KeyStorage;
use wallet_rs::utils::logger;
use wallet_rs::wallet::{DebitLedger, KeyRegistry, WalletResolver};
use wallet_rs::{init_env, AppContext, HTTP_PORT, SQLITE_PATH};

#[derive(Debug, Parser)]
#[command(name = "wallet-rs", about = "Prepaid API key and credit wallet service")]
struct Args {
    /// Listen port, overrides WALLET_HTTP_PORT
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database URL, overrides WALLET_SQLITE_PATH
    #[arg(long)]
    database: Option<String>,

    /// Directory for rolling log files
    #[arg(long, default_value = "./logs")]
    log_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    init_env();
    let args = Args::parse();

    // Initialize logging system
    let _guard = logger::init(args.log_dir.clone())?;

    // Create necessary directories
    fs::create_dir_all("./wallet_data/database")?;

    info!("Starting credit wallet service...");

    // Initialize storage
    info!("Initializing key storage...");
    let database_url = args.database.unwrap_or_else(|| SQLITE_PATH.clone());
    let storage: Arc<dyn KeyStorage> = Arc::new(SqliteKeyStorage::new(&database_url).await?);

    // Wire up the wallet components
    let registry = Arc::new(KeyRegistry::new(storage.clone()));
    let ledger = Arc::new(DebitLedger::new(storage.clone()));
    let resolver = Arc::new(WalletResolver::new(storage.clone(), ledger.clone()));

    let ctx = Arc::new(AppContext {
        registry,
        ledger,
        resolver,
        storage,
    });

    // Start HTTP server
    let port = args.port.unwrap_or(*HTTP_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    match wallet_rs::web::start_server(ctx, addr).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            return Err(e);
        }
    }

    info!("Shutting down...");
    Ok(())
}
