//! Ephemeral per-user session storage.
//!
//! A session holds one `SessionContext`, written wholesale by question
//! generation and read by answer generation. The store is injected into
//! `AppState` as `Arc<dyn SessionStore>`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::interview::models::SessionContext;

pub mod redis_store;

pub use redis_store::RedisSessionStore;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "starcoach_session";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Session payload could not be (de)serialized: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<SessionContext>, SessionError>;

    /// Replaces whatever the session held before.
    async fn set(&self, id: Uuid, context: &SessionContext) -> Result<(), SessionError>;
}

/// Process-local store. Entries expire `ttl` after their last write.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, (SessionContext, Instant)>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: Uuid) -> Result<Option<SessionContext>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&id)
            .filter(|(_, written)| written.elapsed() < self.ttl)
            .map(|(context, _)| context.clone()))
    }

    async fn set(&self, id: Uuid, context: &SessionContext) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let ttl = self.ttl;
        sessions.retain(|_, (_, written)| written.elapsed() < ttl);
        sessions.insert(id, (context.clone(), Instant::now()));
        Ok(())
    }
}

/// Reads the session id from the request's `Cookie` header, if present and well-formed.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// `Set-Cookie` value binding the browser to `id`.
pub fn session_cookie(id: Uuid) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}
