use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::pricing::{calculate_cost, MARGIN, PRICING_TABLE};

pub fn router() -> Router {
    Router::new()
        .route("/keys/pricing", get(pricing_table))
        .route("/pricing/calculate", post(calculate))
}

async fn pricing_table() -> impl IntoResponse {
    Json(json!({
        "providers": &*PRICING_TABLE,
        "margin": MARGIN,
        "currency": "USD",
        "unit": "per_1M_tokens",
    }))
}

#[derive(Debug, Deserialize)]
pub struct CalculateRequest {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

async fn calculate(Json(req): Json<CalculateRequest>) -> impl IntoResponse {
    let (Some(provider), Some(model), Some(input_tokens), Some(output_tokens)) =
        (req.provider, req.model, req.input_tokens, req.output_tokens)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "provider, model, input_tokens and output_tokens are required.",
            })),
        )
            .into_response();
    };

    let estimate = calculate_cost(&provider, &model, input_tokens, output_tokens);
    (
        StatusCode::OK,
        Json(json!({
            "provider": provider,
            "model": model,
            "tokens": {
                "input_tokens": input_tokens,
                "output_tokens": output_tokens,
            },
            "cost_usd": estimate.cost_usd,
            "breakdown": estimate.breakdown,
            "note": estimate.note(),
        })),
    )
        .into_response()
}
