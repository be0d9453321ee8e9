use std::sync::Arc;

use crate::config::Config;
use crate::interview::extract::TextExtractor;
use crate::llm_client::Upstream;
use crate::rate_limit::RateLimiter;
use crate::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Completion provider wrapped by the retry policy.
    pub upstream: Upstream,
    pub extractor: Arc<dyn TextExtractor>,
    /// Pluggable session backend. Default: in-memory. Swap via SESSION_BACKEND.
    pub sessions: Arc<dyn SessionStore>,
    /// The only shared mutable state in the pipeline; guarded internally.
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Config,
}
