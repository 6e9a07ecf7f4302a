#![allow(clippy::uninlined_format_args)]

pub mod pricing;
pub mod storage;
pub mod utils;
pub mod wallet;
pub mod web;

use once_cell::sync::Lazy;
use std::sync::Arc;

use storage::KeyStorage;
use wallet::{DebitLedger, KeyRegistry, WalletResolver};

pub static SQLITE_PATH: Lazy<String> = Lazy::new(|| {
    std::env::var("WALLET_SQLITE_PATH")
        .unwrap_or_else(|_| "sqlite:./wallet_data/database/keys.db?mode=rwc".to_string())
});

pub static HTTP_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("WALLET_HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(7400)
});

pub fn init_env() {
    dotenv::dotenv().ok();
}

/// Shared application state handed to every HTTP handler.
pub struct AppContext {
    pub registry: Arc<KeyRegistry>,
    pub ledger: Arc<DebitLedger>,
    pub resolver: Arc<WalletResolver>,
    pub storage: Arc<dyn KeyStorage>,
}
