use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status plus the active pipeline modes.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "starcoach-api",
        "model": state.config.model,
        "validation_mode": format!("{:?}", state.config.pipeline.validation_mode),
        "answer_mode": format!("{:?}", state.config.pipeline.answer_mode),
        "api_key_configured": !state.config.anthropic_api_key.is_empty(),
    }))
}
