pub mod keys;
pub mod pricing;
pub mod wallet;

use crate::AppContext;
use axum::{routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(keys::router(ctx.clone()))
        .merge(pricing::router())
        .merge(wallet::router(ctx))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "key-validation-service",
    }))
}
