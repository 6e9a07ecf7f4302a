use crate::pricing;
use crate::storage::KeyStorage;
use crate::wallet::error::WalletError;
use crate::wallet::ledger::DebitLedger;
use crate::wallet::types::{
    DebitResult, DebitStatus, KeyRecord, KeyStatus, KeySummary, TokenCounts, TokenDebit,
    UserDebit, WalletSummary,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

/// Inputs for a token-priced debit, charged either against an explicit
/// key or through a user's wallet.
#[derive(Debug, Clone)]
pub struct TokenDebitRequest {
    pub user_id: Option<String>,
    pub key_code: Option<String>,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Resolves "charge this user" requests to a concrete key and composes
/// the pricing engine with the ledger.
pub struct WalletResolver {
    storage: Arc<dyn KeyStorage>,
    ledger: Arc<DebitLedger>,
}

impl WalletResolver {
    pub fn new(storage: Arc<dyn KeyStorage>, ledger: Arc<DebitLedger>) -> Self {
        Self { storage, ledger }
    }

    /// The user's best chargeable key: ACTIVE, not expired, non-zero
    /// remaining balance, optionally scoped to a provider; greatest
    /// remaining balance wins.
    pub async fn find_active_key(
        &self,
        user_id: &str,
        provider: Option<&str>,
    ) -> Result<Option<KeyRecord>, WalletError> {
        let now = Utc::now();
        let mut candidates: Vec<KeyRecord> = self
            .storage
            .list_by_user(user_id)
            .await?
            .into_iter()
            .filter(|k| {
                k.status == KeyStatus::Active && !k.is_expired(now) && k.remaining_balance() > 0.0
            })
            .filter(|k| {
                provider
                    .map(|p| k.provider.is_empty() || k.provider.eq_ignore_ascii_case(p))
                    .unwrap_or(true)
            })
            .collect();
        candidates.sort_by(|a, b| b.remaining_balance().total_cmp(&a.remaining_balance()));
        Ok(candidates.into_iter().next())
    }

    /// Charge a user's wallet. Fails fast when no key qualifies or the
    /// resolved key cannot cover the full amount; no partial debit on
    /// this path.
    pub async fn debit_by_user(
        &self,
        user_id: &str,
        amount_usd: f64,
        provider: Option<&str>,
        description: &str,
    ) -> Result<UserDebit, WalletError> {
        let Some(key) = self.find_active_key(user_id, provider).await? else {
            return Err(WalletError::NoActiveKey);
        };

        let remaining = key.remaining_balance();
        if remaining < amount_usd {
            return Err(WalletError::InsufficientBalance {
                remaining,
                requested: amount_usd,
            });
        }

        let debit = self
            .ledger
            .debit(&key.key_code, Some(user_id), amount_usd, description)
            .await;
        Ok(UserDebit {
            key_code: key.key_code,
            debit,
        })
    }

    /// Price a token usage and charge it. The computed cost and
    /// breakdown are reported even when the debit fails.
    pub async fn debit_by_tokens(&self, req: TokenDebitRequest) -> TokenDebit {
        let estimate =
            pricing::calculate_cost(&req.provider, &req.model, req.input_tokens, req.output_tokens);
        let label = format!("{}/{}", req.provider, req.model);

        let (key_code, debit) = if let Some(code) = req.key_code.as_deref() {
            let debit = self
                .ledger
                .debit(code, req.user_id.as_deref(), estimate.cost_usd, &label)
                .await;
            (Some(code.trim().to_uppercase()), debit)
        } else if let Some(user_id) = req.user_id.as_deref() {
            match self
                .debit_by_user(user_id, estimate.cost_usd, Some(&req.provider), &label)
                .await
            {
                Ok(user_debit) => (Some(user_debit.key_code), user_debit.debit),
                Err(e @ (WalletError::NoActiveKey | WalletError::InsufficientBalance { .. })) => (
                    None,
                    DebitResult {
                        success: false,
                        new_balance: 0.0,
                        message: e.to_string(),
                        status: DebitStatus::Depleted,
                    },
                ),
                Err(e) => (None, DebitResult::error(e.to_string())),
            }
        } else {
            (
                None,
                DebitResult::error("Either key_code or user_id is required."),
            )
        };

        TokenDebit {
            provider: req.provider,
            model: req.model,
            tokens: TokenCounts {
                input_tokens: req.input_tokens,
                output_tokens: req.output_tokens,
            },
            cost_usd: estimate.cost_usd,
            breakdown: estimate.breakdown,
            key_code,
            debit,
        }
    }

    /// Per-key summaries for a user's dashboard. Degrades to an empty
    /// list on storage error so listings stay non-blocking.
    pub async fn list_user_keys(&self, user_id: &str) -> Vec<KeySummary> {
        match self.storage.list_by_user(user_id).await {
            Ok(records) => records.into_iter().map(KeySummary::from).collect(),
            Err(e) => {
                warn!(user_id, error = %e, "Key listing degraded to empty on storage error");
                Vec::new()
            }
        }
    }

    /// Aggregate wallet view. Degrades to a zeroed summary on storage
    /// error.
    pub async fn wallet_summary(&self, user_id: &str) -> WalletSummary {
        let records = match self.storage.list_by_user(user_id).await {
            Ok(records) => records,
            Err(e) => {
                warn!(user_id, error = %e, "Wallet summary degraded to zero on storage error");
                return WalletSummary::empty(user_id);
            }
        };

        let now = Utc::now();
        let mut active: Vec<&KeyRecord> = records
            .iter()
            .filter(|k| {
                k.status == KeyStatus::Active && !k.is_expired(now) && k.remaining_balance() > 0.0
            })
            .collect();
        active.sort_by(|a, b| b.remaining_balance().total_cmp(&a.remaining_balance()));

        WalletSummary {
            user_id: user_id.to_string(),
            total_balance: active.iter().map(|k| k.remaining_balance()).sum(),
            active_keys: active.len(),
            primary_key: active.first().map(|k| k.key_code.clone()),
        }
    }
}
