use sea_orm::*;
use sea_query::Expr;
use anyhow::Result;
use super::key_entity;
use super::{DebitUpdate, KeyStorage};
use crate::storage::Db;
use crate::wallet::types::{KeyRecord, KeyStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

#[derive(Clone)]
pub struct SqliteKeyStorage {
    db: Db,
}

impl SqliteKeyStorage {
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Initializing SQLite key storage at {}", database_url);

        let db = Database::connect(
            ConnectOptions::new(database_url.to_owned())
                .sqlx_logging(false)
                .to_owned()
        ).await?;

        db.execute(Statement::from_string(
            DbBackend::Sqlite,
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                key_code TEXT PRIMARY KEY NOT NULL,
                provider TEXT NOT NULL,
                balance_usd REAL NOT NULL,
                current_usage REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                user_id TEXT,
                created_at TEXT NOT NULL,
                activated_at TEXT,
                depleted_at TEXT,
                last_used_at TEXT,
                expires_at TEXT,
                last_provider TEXT
            )
            "#.to_owned(),
        ))
        .await?;

        Ok(Self { db })
    }
}

#[async_trait]
impl KeyStorage for SqliteKeyStorage {
    async fn get(&self, key_code: &str) -> Result<Option<KeyRecord>> {
        let record = key_entity::Entity::find()
            .filter(key_entity::Column::KeyCode.eq(key_code))
            .one(&self.db)
            .await?;
        Ok(record.map(KeyRecord::from))
    }

    async fn insert(&self, record: KeyRecord) -> Result<()> {
        let active_model: key_entity::ActiveModel = record.into();
        key_entity::Entity::insert(active_model)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<KeyRecord>> {
        let records = key_entity::Entity::find()
            .filter(key_entity::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?;
        Ok(records.into_iter().map(KeyRecord::from).collect())
    }

    async fn update_status(&self, key_code: &str, status: KeyStatus) -> Result<()> {
        key_entity::Entity::update_many()
            .filter(key_entity::Column::KeyCode.eq(key_code))
            .set(key_entity::ActiveModel {
                status: Set(status.to_string()),
                ..Default::default()
            })
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn bind_user(
        &self,
        key_code: &str,
        user_id: &str,
        activated_at: DateTime<Utc>,
    ) -> Result<bool> {
        // Conditional on user_id IS NULL: a key can only ever bind once.
        let result = key_entity::Entity::update_many()
            .filter(key_entity::Column::KeyCode.eq(key_code))
            .filter(key_entity::Column::UserId.is_null())
            .set(key_entity::ActiveModel {
                user_id: Set(Some(user_id.to_string())),
                status: Set(KeyStatus::Active.to_string()),
                activated_at: Set(Some(activated_at)),
                ..Default::default()
            })
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn apply_debit(
        &self,
        key_code: &str,
        expected_usage: f64,
        update: DebitUpdate,
    ) -> Result<bool> {
        // Single conditional UPDATE doubling as a compare-and-swap on
        // current_usage; a lost race affects zero rows.
        let mut active_model = key_entity::ActiveModel {
            current_usage: Set(update.new_usage),
            status: Set(update.new_status.to_string()),
            last_used_at: Set(Some(update.last_used_at)),
            last_provider: Set(Some(update.last_provider)),
            ..Default::default()
        };
        if update.depleted_at.is_some() {
            active_model.depleted_at = Set(update.depleted_at);
        }

        let result = key_entity::Entity::update_many()
            .filter(key_entity::Column::KeyCode.eq(key_code))
            .filter(key_entity::Column::Status.eq(KeyStatus::Active.as_str()))
            .filter(Expr::col(key_entity::Column::CurrentUsage).eq(expected_usage))
            .set(active_model)
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}
