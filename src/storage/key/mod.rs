mod key_entity;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use sqlite::SqliteKeyStorage;

use crate::wallet::types::{KeyRecord, KeyStatus};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Mutation applied by a successful conditional debit.
#[derive(Debug, Clone)]
pub struct DebitUpdate {
    pub new_usage: f64,
    pub new_status: KeyStatus,
    pub last_used_at: DateTime<Utc>,
    pub depleted_at: Option<DateTime<Utc>>,
    pub last_provider: String,
}

/// Persistence contract for key records.
///
/// `apply_debit` and `bind_user` are conditional single-row updates; they
/// are the only writes that race between requests and the storage layer
/// must execute them atomically (the update carries its own predicate).
#[async_trait]
pub trait KeyStorage: Send + Sync + 'static {
    async fn get(&self, key_code: &str) -> Result<Option<KeyRecord>>;

    async fn insert(&self, record: KeyRecord) -> Result<()>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<KeyRecord>>;

    async fn update_status(&self, key_code: &str, status: KeyStatus) -> Result<()>;

    /// Bind an unowned key to `user_id` and activate it. Returns false if
    /// the key was already bound (predicate `user_id IS NULL` failed).
    async fn bind_user(
        &self,
        key_code: &str,
        user_id: &str,
        activated_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Compare-and-swap debit: applies `update` only while the key is
    /// still ACTIVE and `current_usage` equals `expected_usage`. Returns
    /// false when the predicate failed (a concurrent debit won the race).
    async fn apply_debit(
        &self,
        key_code: &str,
        expected_usage: f64,
        update: DebitUpdate,
    ) -> Result<bool>;
}

impl From<key_entity::Model> for KeyRecord {
    fn from(model: key_entity::Model) -> Self {
        let status = model.get_status();
        KeyRecord {
            key_code: model.key_code,
            provider: model.provider,
            balance_usd: model.balance_usd,
            current_usage: model.current_usage,
            status,
            user_id: model.user_id,
            created_at: model.created_at,
            activated_at: model.activated_at,
            depleted_at: model.depleted_at,
            last_used_at: model.last_used_at,
            expires_at: model.expires_at,
            last_provider: model.last_provider,
        }
    }
}

impl From<KeyRecord> for key_entity::ActiveModel {
    fn from(record: KeyRecord) -> Self {
        use sea_orm::ActiveValue::Set;

        key_entity::ActiveModel {
            key_code: Set(record.key_code),
            provider: Set(record.provider),
            balance_usd: Set(record.balance_usd),
            current_usage: Set(record.current_usage),
            status: Set(record.status.to_string()),
            user_id: Set(record.user_id),
            created_at: Set(record.created_at),
            activated_at: Set(record.activated_at),
            depleted_at: Set(record.depleted_at),
            last_used_at: Set(record.last_used_at),
            expires_at: Set(record.expires_at),
            last_provider: Set(record.last_provider),
        }
    }
}
