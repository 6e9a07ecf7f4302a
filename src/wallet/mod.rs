pub mod error;
pub mod ledger;
pub mod registry;
pub mod resolver;
pub mod types;


pub use error::WalletError;
pub use ledger::DebitLedger;
pub use registry::KeyRegistry;
pub use resolver::{TokenDebitRequest, WalletResolver};
pub use types::{
    DebitResult, DebitStatus, KeyRecord, KeyStatus, KeySummary, TokenCounts, TokenDebit,
    UserDebit, ValidationResult, WalletSummary,
};
