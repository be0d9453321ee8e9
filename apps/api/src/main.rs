mod config;
mod errors;
mod interview;
mod llm_client;
mod rate_limit;
mod routes;
mod session;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::{Config, SessionBackend};
use crate::interview::extract::PdfTextExtractor;
use crate::llm_client::{LlmClient, RetryPolicy, Upstream};
use crate::rate_limit::RateLimiter;
use crate::routes::build_router;
use crate::session::{InMemorySessionStore, RedisSessionStore, SessionStore};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting StarCoach API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client behind the retry policy
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.model.clone())?;
    info!("LLM client initialized (model: {})", llm.model());
    let retry = RetryPolicy::new(config.retry_max_attempts, config.retry_initial_delay);
    let upstream = Upstream::new(Arc::new(llm), retry);

    // Initialize session store
    let sessions: Arc<dyn SessionStore> = match &config.session_backend {
        SessionBackend::Memory => {
            info!("Using in-memory session store");
            Arc::new(InMemorySessionStore::new(config.session_ttl))
        }
        SessionBackend::Redis { url } => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis session store initialized");
            Arc::new(RedisSessionStore::new(client, config.session_ttl))
        }
    };

    let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
    info!(
        "Rate limit: {} requests per {}s per client (trust forwarded headers: {})",
        config.rate_limit.max_requests,
        config.rate_limit.window.as_secs(),
        config.rate_limit.trust_forwarded_for
    );
    info!(
        "Pipeline: validation={:?}, answers={:?}, {} questions (min {})",
        config.pipeline.validation_mode,
        config.pipeline.answer_mode,
        config.pipeline.question_count_target,
        config.pipeline.question_count_min
    );

    // Build app state
    let state = AppState {
        upstream,
        extractor: Arc::new(PdfTextExtractor),
        sessions,
        rate_limiter,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
