pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::Uri,
    routing::{get, post},
    Router,
};

use crate::errors::AppError;
use crate::interview::handlers;
use crate::state::AppState;

/// Room for multipart framing and the job title on top of the file itself.
const BODY_LIMIT_HEADROOM: usize = 64 * 1024;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.pipeline.max_upload_bytes + BODY_LIMIT_HEADROOM;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/health", get(health::health_handler))
        .route(
            "/generate_questions",
            post(handlers::handle_generate_questions),
        )
        .route("/generate_answers", post(handlers::handle_generate_answers))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
