use crate::storage::key::DebitUpdate;
use crate::storage::KeyStorage;
use crate::wallet::types::{DebitResult, DebitStatus, KeyStatus};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Bounded retries for a debit that loses its compare-and-swap race.
const MAX_DEBIT_ATTEMPTS: usize = 3;

enum Attempt {
    Done(DebitResult),
    Conflict,
}

/// Applies debits against a single key, enforcing the non-negative
/// balance invariant via conditional storage writes.
pub struct DebitLedger {
    storage: Arc<dyn KeyStorage>,
}

impl DebitLedger {
    pub fn new(storage: Arc<dyn KeyStorage>) -> Self {
        Self { storage }
    }

    /// Debit `amount_usd` from a key. A debit exceeding the remaining
    /// balance charges exactly the remainder and depletes the key,
    /// reported as a failure since the full amount could not be charged.
    /// Never returns an error: storage faults map to status `ERROR`.
    pub async fn debit(
        &self,
        key_code: &str,
        owning_user_id: Option<&str>,
        amount_usd: f64,
        provider_label: &str,
    ) -> DebitResult {
        if !amount_usd.is_finite() || amount_usd < 0.0 {
            return DebitResult::error("Debit amount must be a non-negative number.");
        }
        let code = key_code.trim().to_uppercase();

        for attempt in 1..=MAX_DEBIT_ATTEMPTS {
            match self
                .try_debit(&code, owning_user_id, amount_usd, provider_label)
                .await
            {
                Ok(Attempt::Done(result)) => return result,
                Ok(Attempt::Conflict) => {
                    warn!(key_code = %code, attempt, "Debit lost a concurrent update, retrying");
                }
                Err(e) => {
                    error!(key_code = %code, error = %e, "Debit failed with storage error");
                    return DebitResult::error("Internal server error while debiting key.");
                }
            }
        }

        warn!(key_code = %code, "Debit gave up after repeated update conflicts");
        DebitResult::error("Concurrent debit conflict, please retry.")
    }

    async fn try_debit(
        &self,
        code: &str,
        owning_user_id: Option<&str>,
        amount_usd: f64,
        provider_label: &str,
    ) -> Result<Attempt> {
        let Some(record) = self.storage.get(code).await? else {
            return Ok(Attempt::Done(DebitResult::error("Key not found.")));
        };

        if let Some(owner) = owning_user_id {
            if record.user_id.as_deref().is_some_and(|u| u != owner) {
                return Ok(Attempt::Done(DebitResult::error(
                    "Key belongs to another user.",
                )));
            }
        }

        let now = Utc::now();
        if record.is_expired(now) {
            if record.status != KeyStatus::Expired {
                self.storage.update_status(code, KeyStatus::Expired).await?;
                info!(key_code = %code, "Key expired, status persisted");
            }
            return Ok(Attempt::Done(DebitResult {
                success: false,
                new_balance: record.remaining_balance(),
                message: format!("Key is {}.", KeyStatus::Expired),
                status: DebitStatus::Expired,
            }));
        }

        if record.status != KeyStatus::Active {
            return Ok(Attempt::Done(DebitResult {
                success: false,
                new_balance: record.remaining_balance(),
                message: format!("Key is {}.", record.status),
                status: record.status.into(),
            }));
        }

        let remaining = record.balance_usd - record.current_usage;

        if remaining < amount_usd {
            // Final debit: charge only what is left and deplete the key.
            let charged = remaining.max(0.0);
            let update = DebitUpdate {
                new_usage: record.balance_usd,
                new_status: KeyStatus::Depleted,
                last_used_at: now,
                depleted_at: Some(now),
                last_provider: provider_label.to_string(),
            };
            if self
                .storage
                .apply_debit(code, record.current_usage, update)
                .await?
            {
                info!(
                    key_code = %code,
                    requested = amount_usd,
                    charged,
                    "Final partial debit applied, key depleted"
                );
                return Ok(Attempt::Done(DebitResult {
                    success: false,
                    new_balance: 0.0,
                    message: format!(
                        "Insufficient balance: final debit of ${:.6} applied, key is now DEPLETED.",
                        charged
                    ),
                    status: DebitStatus::Depleted,
                }));
            }
            return Ok(Attempt::Conflict);
        }

        let new_usage = record.current_usage + amount_usd;
        let new_balance = (record.balance_usd - new_usage).max(0.0);
        let depleted = new_balance <= 0.0;
        let update = DebitUpdate {
            new_usage,
            new_status: if depleted {
                KeyStatus::Depleted
            } else {
                KeyStatus::Active
            },
            last_used_at: now,
            depleted_at: depleted.then_some(now),
            last_provider: provider_label.to_string(),
        };
        if self
            .storage
            .apply_debit(code, record.current_usage, update)
            .await?
        {
            info!(
                key_code = %code,
                amount = amount_usd,
                new_balance,
                provider = provider_label,
                "Debit applied"
            );
            return Ok(Attempt::Done(DebitResult {
                success: true,
                new_balance,
                message: format!("Debited ${:.6}.", amount_usd),
                status: if depleted {
                    DebitStatus::Depleted
                } else {
                    DebitStatus::Active
                },
            }));
        }
        Ok(Attempt::Conflict)
    }
}
