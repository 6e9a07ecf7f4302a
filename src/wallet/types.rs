use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a prepaid key. `DEPLETED` and `EXPIRED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyStatus {
    New,
    Active,
    Depleted,
    Expired,
    Unknown,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::New => "NEW",
            KeyStatus::Active => "ACTIVE",
            KeyStatus::Depleted => "DEPLETED",
            KeyStatus::Expired => "EXPIRED",
            KeyStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, KeyStatus::Depleted | KeyStatus::Expired)
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "NEW" => KeyStatus::New,
            "ACTIVE" => KeyStatus::Active,
            "DEPLETED" => KeyStatus::Depleted,
            "EXPIRED" => KeyStatus::Expired,
            _ => KeyStatus::Unknown,
        })
    }
}

/// Status reported by a debit attempt. Mirrors [`KeyStatus`] plus the
/// generic `ERROR` used for lookup failures and storage faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DebitStatus {
    New,
    Active,
    Depleted,
    Expired,
    Unknown,
    Error,
}

impl From<KeyStatus> for DebitStatus {
    fn from(status: KeyStatus) -> Self {
        match status {
            KeyStatus::New => DebitStatus::New,
            KeyStatus::Active => DebitStatus::Active,
            KeyStatus::Depleted => DebitStatus::Depleted,
            KeyStatus::Expired => DebitStatus::Expired,
            KeyStatus::Unknown => DebitStatus::Unknown,
        }
    }
}

/// One prepaid key record as the domain sees it, independent of the
/// storage entity.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecord {
    pub key_code: String,
    pub provider: String,
    pub balance_usd: f64,
    pub current_usage: f64,
    pub status: KeyStatus,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub depleted_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_provider: Option<String>,
}

impl KeyRecord {
    pub fn remaining_balance(&self) -> f64 {
        (self.balance_usd - self.current_usage).max(0.0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Outcome of a key validation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub status: KeyStatus,
    pub balance_usd: f64,
    pub current_usage: f64,
    pub remaining_balance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ValidationResult {
    pub fn invalid(status: KeyStatus, error: impl Into<String>) -> Self {
        Self {
            valid: false,
            provider: None,
            status,
            balance_usd: 0.0,
            current_usage: 0.0,
            remaining_balance: 0.0,
            error: Some(error.into()),
            user_id: None,
        }
    }
}

/// Outcome of a debit attempt against a single key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebitResult {
    pub success: bool,
    pub new_balance: f64,
    pub message: String,
    pub status: DebitStatus,
}

impl DebitResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            new_balance: 0.0,
            message: message.into(),
            status: DebitStatus::Error,
        }
    }
}

/// Per-key view returned by the user key listing.
#[derive(Debug, Clone, Serialize)]
pub struct KeySummary {
    pub key_code: String,
    pub provider: String,
    pub balance_usd: f64,
    pub current_usage: f64,
    pub remaining_balance: f64,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<KeyRecord> for KeySummary {
    fn from(record: KeyRecord) -> Self {
        let remaining = record.remaining_balance();
        Self {
            key_code: record.key_code,
            provider: record.provider,
            balance_usd: record.balance_usd,
            current_usage: record.current_usage,
            remaining_balance: remaining,
            status: record.status,
            created_at: record.created_at,
            activated_at: record.activated_at,
            last_used_at: record.last_used_at,
            expires_at: record.expires_at,
        }
    }
}

/// Aggregate balance across all of a user's active keys.
#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    pub user_id: String,
    pub total_balance: f64,
    pub active_keys: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
}

impl WalletSummary {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            total_balance: 0.0,
            active_keys: 0,
            primary_key: None,
        }
    }
}

/// Debit resolved through a user's wallet rather than an explicit key.
#[derive(Debug, Clone, Serialize)]
pub struct UserDebit {
    pub key_code: String,
    #[serde(flatten)]
    pub debit: DebitResult,
}

/// Token counts attached to a token-based debit response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Result of a token-priced debit: the computed charge is reported even
/// when the debit itself fails.
#[derive(Debug, Clone, Serialize)]
pub struct TokenDebit {
    pub provider: String,
    pub model: String,
    pub tokens: TokenCounts,
    pub cost_usd: f64,
    pub breakdown: crate::pricing::CostBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_code: Option<String>,
    #[serde(flatten)]
    pub debit: DebitResult,
}
