use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::wallet::types::{DebitResult, KeyStatus, ValidationResult};
use crate::AppContext;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/keys/validate", post(validate))
        .route("/keys/debit", post(debit))
        .route("/keys/:key_code/balance", get(balance))
        .route("/keys/create", post(create))
        .route("/keys/user/:user_id", get(user_keys))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub key_code: Option<String>,
    pub user_id: Option<String>,
}

async fn validate(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<ValidateRequest>,
) -> impl IntoResponse {
    let key_code = req.key_code.as_deref().map(str::trim).filter(|c| !c.is_empty());
    if key_code.is_none() {
        let result = ValidationResult::invalid(KeyStatus::Unknown, "Key code is required.");
        return (StatusCode::BAD_REQUEST, Json(result)).into_response();
    }

    match ctx.registry.validate(key_code, req.user_id.as_deref()).await {
        Ok(result) => {
            let code = if result.valid {
                StatusCode::OK
            } else {
                StatusCode::UNAUTHORIZED
            };
            (code, Json(result)).into_response()
        }
        Err(e) => {
            error!(error = %e, "Key validation failed");
            let result = ValidationResult::invalid(KeyStatus::Unknown, "Internal server error.");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(result)).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DebitRequest {
    pub key_code: Option<String>,
    pub amount_usd: Option<f64>,
    pub description: Option<String>,
}

async fn debit(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<DebitRequest>,
) -> impl IntoResponse {
    let (Some(key_code), Some(amount_usd)) = (req.key_code, req.amount_usd) else {
        let result = DebitResult::error("key_code and amount_usd are required.");
        return (StatusCode::BAD_REQUEST, Json(result)).into_response();
    };

    let label = req.description.unwrap_or_else(|| "manual debit".to_string());
    let result = ctx.ledger.debit(&key_code, None, amount_usd, &label).await;
    let code = if result.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (code, Json(result)).into_response()
}

#[derive(Debug, Serialize)]
struct BalanceResponse {
    key_code: String,
    provider: String,
    balance_usd: f64,
    current_usage: f64,
    remaining_balance: f64,
    status: KeyStatus,
}

async fn balance(
    State(ctx): State<Arc<AppContext>>,
    Path(key_code): Path<String>,
) -> impl IntoResponse {
    let code = key_code.trim().to_uppercase();
    match ctx.storage.get(&code).await {
        Ok(Some(record)) => {
            let response = BalanceResponse {
                key_code: record.key_code.clone(),
                provider: record.provider.clone(),
                balance_usd: record.balance_usd,
                current_usage: record.current_usage,
                remaining_balance: record.remaining_balance(),
                status: record.status,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Key code not found." })),
        )
            .into_response(),
        Err(e) => {
            error!(key_code = %code, error = %e, "Balance lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Internal server error." })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub key_code: Option<String>,
    pub provider: Option<String>,
    pub balance_usd: Option<f64>,
    pub expires_days: Option<i64>,
}

async fn create(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<CreateRequest>,
) -> impl IntoResponse {
    let (Some(provider), Some(balance_usd)) = (req.provider, req.balance_usd) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "provider and balance_usd are required.",
            })),
        )
            .into_response();
    };

    match ctx
        .registry
        .create(&provider, balance_usd, req.key_code, req.expires_days)
        .await
    {
        Ok(key_code) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "key_code": key_code,
                "message": "Key created successfully.",
            })),
        )
            .into_response(),
        Err(e) => {
            error!(provider = %provider, error = %e, "Key creation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Failed to create key.",
                })),
            )
                .into_response()
        }
    }
}

async fn user_keys(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let keys = ctx.resolver.list_user_keys(&user_id).await;
    (StatusCode::OK, Json(keys)).into_response()
}
