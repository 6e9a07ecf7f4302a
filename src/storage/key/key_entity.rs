use sea_orm::entity::prelude::*;
use chrono::{DateTime, Utc};
use crate::wallet::types::KeyStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key_code: String,
    pub provider: String,
    pub balance_usd: f64,
    pub current_usage: f64,
    pub status: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub depleted_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_provider: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn get_status(&self) -> KeyStatus {
        self.status.parse().unwrap_or(KeyStatus::Unknown)
    }
}
