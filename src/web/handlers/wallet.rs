use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::wallet::error::WalletError;
use crate::wallet::resolver::TokenDebitRequest;
use crate::wallet::types::{DebitResult, DebitStatus};
use crate::AppContext;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/wallet/debit", post(wallet_debit))
        .route("/wallet/debit-by-tokens", post(debit_by_tokens))
        .route("/wallet/:user_id", get(wallet_summary))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
pub struct WalletDebitRequest {
    pub user_id: Option<String>,
    pub amount_usd: Option<f64>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub description: Option<String>,
}

async fn wallet_debit(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<WalletDebitRequest>,
) -> impl IntoResponse {
    let (Some(user_id), Some(amount_usd)) = (req.user_id, req.amount_usd) else {
        let result = DebitResult::error("user_id and amount_usd are required.");
        return (StatusCode::BAD_REQUEST, Json(result)).into_response();
    };

    let label = match (&req.provider, &req.model) {
        (Some(provider), Some(model)) => format!("{}/{}", provider, model),
        _ => req.description.unwrap_or_else(|| "wallet debit".to_string()),
    };

    match ctx
        .resolver
        .debit_by_user(&user_id, amount_usd, req.provider.as_deref(), &label)
        .await
    {
        Ok(user_debit) => {
            let code = if user_debit.debit.success {
                StatusCode::OK
            } else {
                StatusCode::BAD_REQUEST
            };
            (code, Json(user_debit)).into_response()
        }
        Err(e @ (WalletError::NoActiveKey | WalletError::InsufficientBalance { .. })) => {
            let result = DebitResult {
                success: false,
                new_balance: 0.0,
                message: e.to_string(),
                status: DebitStatus::Depleted,
            };
            (StatusCode::PAYMENT_REQUIRED, Json(result)).into_response()
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Wallet debit failed");
            let result = DebitResult::error("Internal server error while debiting wallet.");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(result)).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DebitByTokensRequest {
    pub user_id: Option<String>,
    pub key_code: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

async fn debit_by_tokens(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<DebitByTokensRequest>,
) -> impl IntoResponse {
    let (Some(provider), Some(model), Some(input_tokens), Some(output_tokens)) =
        (req.provider, req.model, req.input_tokens, req.output_tokens)
    else {
        let result =
            DebitResult::error("provider, model, input_tokens and output_tokens are required.");
        return (StatusCode::BAD_REQUEST, Json(result)).into_response();
    };
    if req.user_id.is_none() && req.key_code.is_none() {
        let result = DebitResult::error("Either key_code or user_id is required.");
        return (StatusCode::BAD_REQUEST, Json(result)).into_response();
    }

    let outcome = ctx
        .resolver
        .debit_by_tokens(TokenDebitRequest {
            user_id: req.user_id,
            key_code: req.key_code,
            provider,
            model,
            input_tokens,
            output_tokens,
        })
        .await;

    let code = if outcome.debit.success {
        StatusCode::OK
    } else if outcome.debit.status == DebitStatus::Depleted {
        StatusCode::PAYMENT_REQUIRED
    } else {
        StatusCode::BAD_REQUEST
    };
    (code, Json(outcome)).into_response()
}

async fn wallet_summary(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let summary = ctx.resolver.wallet_summary(&user_id).await;
    (StatusCode::OK, Json(summary)).into_response()
}
