use std::fmt;

#[derive(Debug)]
pub enum WalletError {
    NoActiveKey,
    InsufficientBalance { remaining: f64, requested: f64 },
    StorageError(String),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::NoActiveKey => write!(f, "No active key found for this user"),
            WalletError::InsufficientBalance { remaining, requested } => write!(
                f,
                "Insufficient balance: ${:.6} remaining, ${:.6} requested",
                remaining, requested
            ),
            WalletError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for WalletError {}

impl From<anyhow::Error> for WalletError {
    fn from(err: anyhow::Error) -> Self {
        WalletError::StorageError(err.to_string())
    }
}
