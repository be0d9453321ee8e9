use std::time::Duration;

use async_trait::async_trait;
use redis::Client as RedisClient;
use tracing::debug;
use uuid::Uuid;

use crate::interview::models::SessionContext;
use crate::session::{SessionError, SessionStore};

const KEY_PREFIX: &str = "starcoach:session:";

/// Server-side store in Redis; each session is a JSON string with `EX ttl`.
pub struct RedisSessionStore {
    client: RedisClient,
    ttl: Duration,
}

impl RedisSessionStore {
    pub fn new(client: RedisClient, ttl: Duration) -> Self {
        Self { client, ttl }
    }

    fn key(id: Uuid) -> String {
        format!("{KEY_PREFIX}{id}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, id: Uuid) -> Result<Option<SessionContext>, SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::key(id))
            .query_async(&mut conn)
            .await?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(SessionError::from)
    }

    async fn set(&self, id: Uuid, context: &SessionContext) -> Result<(), SessionError> {
        let json = serde_json::to_string(context)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("SET")
            .arg(Self::key(id))
            .arg(json)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        debug!("Stored session {id} in Redis");
        Ok(())
    }
}
