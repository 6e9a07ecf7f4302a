use crate::storage::KeyStorage;
use crate::wallet::error::WalletError;
use crate::wallet::types::{KeyRecord, KeyStatus, ValidationResult};
use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

/// Creates key records and drives the validation side of the lifecycle
/// (NEW -> ACTIVE on first bound validation, expiry persistence).
pub struct KeyRegistry {
    storage: Arc<dyn KeyStorage>,
}

impl KeyRegistry {
    pub fn new(storage: Arc<dyn KeyStorage>) -> Self {
        Self { storage }
    }

    /// Create a prepaid key. Generates `{PROVIDER}-{8 uppercase
    /// alphanumeric}` when no code is supplied.
    pub async fn create(
        &self,
        provider: &str,
        balance_usd: f64,
        key_code: Option<String>,
        expires_days: Option<i64>,
    ) -> Result<String, WalletError> {
        let key_code = match key_code {
            Some(code) => code.trim().to_uppercase(),
            None => generate_key_code(provider),
        };

        let now = Utc::now();
        let record = KeyRecord {
            key_code: key_code.clone(),
            provider: provider.to_string(),
            balance_usd,
            current_usage: 0.0,
            status: KeyStatus::New,
            user_id: None,
            created_at: now,
            activated_at: None,
            depleted_at: None,
            last_used_at: None,
            expires_at: expires_days.map(|days| now + Duration::days(days)),
            last_provider: None,
        };
        self.storage.insert(record).await?;

        info!(key_code = %key_code, provider, balance_usd, "Created prepaid key");
        Ok(key_code)
    }

    /// Validate a key for use, binding it to the requesting user on first
    /// contact. Business-rule failures come back as an invalid
    /// [`ValidationResult`]; only storage faults are errors.
    pub async fn validate(
        &self,
        key_code: Option<&str>,
        requesting_user_id: Option<&str>,
    ) -> Result<ValidationResult, WalletError> {
        let Some(code) = key_code.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(ValidationResult::invalid(
                KeyStatus::Unknown,
                "Key code is required.",
            ));
        };
        let code = code.to_uppercase();

        let Some(mut record) = self.storage.get(&code).await? else {
            return Ok(ValidationResult::invalid(
                KeyStatus::Unknown,
                "Key code not found.",
            ));
        };

        let now = Utc::now();
        if record.is_expired(now) {
            if record.status != KeyStatus::Expired {
                self.storage.update_status(&code, KeyStatus::Expired).await?;
                info!(key_code = %code, "Key expired, status persisted");
            }
            return Ok(ValidationResult::invalid(
                KeyStatus::Expired,
                "Key code has expired.",
            ));
        }

        if record.status == KeyStatus::Depleted || record.remaining_balance() <= 0.0 {
            let mut result =
                ValidationResult::invalid(KeyStatus::Depleted, "Key code is depleted.");
            result.provider = Some(record.provider);
            result.balance_usd = record.balance_usd;
            result.current_usage = record.current_usage;
            result.remaining_balance = 0.0;
            return Ok(result);
        }

        if record.status == KeyStatus::Expired {
            return Ok(ValidationResult::invalid(
                KeyStatus::Expired,
                "Key code has expired.",
            ));
        }

        if let (Some(owner), Some(requester)) = (record.user_id.as_deref(), requesting_user_id) {
            if owner != requester {
                return Ok(ValidationResult::invalid(
                    KeyStatus::Unknown,
                    "This key is already assigned to another user",
                ));
            }
        }

        if record.user_id.is_none() {
            if let Some(requester) = requesting_user_id {
                if self.storage.bind_user(&code, requester, now).await? {
                    info!(key_code = %code, user_id = requester, "Key bound and activated");
                    record.user_id = Some(requester.to_string());
                    record.status = KeyStatus::Active;
                    record.activated_at = Some(now);
                } else {
                    // Lost a concurrent first-validation race.
                    record = self.storage.get(&code).await?.ok_or_else(|| {
                        WalletError::StorageError("Key vanished during bind".to_string())
                    })?;
                    if record.user_id.as_deref() != Some(requester) {
                        return Ok(ValidationResult::invalid(
                            KeyStatus::Unknown,
                            "This key is already assigned to another user",
                        ));
                    }
                }
            }
        }

        let remaining_balance = record.remaining_balance();
        Ok(ValidationResult {
            valid: true,
            provider: Some(record.provider),
            status: KeyStatus::Active,
            balance_usd: record.balance_usd,
            current_usage: record.current_usage,
            remaining_balance,
            error: None,
            user_id: record.user_id,
        })
    }
}

fn generate_key_code(provider: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect();
    format!("{}-{}", provider.trim().to_uppercase(), suffix)
}

#[cfg(test)]
mod tests {
    use super::generate_key_code;

    #[test]
    fn test_generated_code_format() {
        for _ in 0..50 {
            let code = generate_key_code("Groq");
            let (prefix, suffix) = code.split_once('-').unwrap();
            assert_eq!(prefix, "GROQ");
            assert_eq!(suffix.len(), 8);
            assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
            assert_eq!(code, code.to_uppercase());
        }
    }
}
