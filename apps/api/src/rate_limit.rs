//! Per-client sliding-window rate limiter guarding the two expensive endpoints.
//!
//! State is process-local and lost on restart. This is abuse protection,
//! not a security boundary.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::state::AppState;

/// The operation a request is charged against. Each has its own window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Questions,
    Answers,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Questions => f.write_str("questions"),
            Bucket::Answers => f.write_str("answers"),
        }
    }
}

/// Opaque key for a rate-limit bucket, usually the client address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(pub String);

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ClientIdentity {
    /// The peer address, or with `trust_forwarded` the first `X-Forwarded-For`
    /// hop, then `X-Real-IP`, before falling back to the peer. `unknown` when
    /// nothing is available.
    pub fn resolve(parts: &Parts, trust_forwarded: bool) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let peer = || {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        };

        let forwarded = if trust_forwarded {
            header("x-forwarded-for").or_else(|| header("x-real-ip"))
        } else {
            None
        };

        ClientIdentity(
            forwarded
                .or_else(peer)
                .unwrap_or_else(|| "unknown".to_string()),
        )
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::resolve(
            parts,
            state.config.rate_limit.trust_forwarded_for,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Admitted; `at` is the recorded timestamp, usable for `refund`.
    Allowed { at: Instant },
    Denied { retry_after: Duration },
}

impl Admission {
    /// Whole seconds to wait, rounded up so a client retrying on time is admitted.
    pub fn retry_after_secs(retry_after: Duration) -> u64 {
        let secs = retry_after.as_secs();
        if retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

type WindowKey = (ClientIdentity, Bucket);

struct Windows {
    stamps: HashMap<WindowKey, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

pub struct RateLimiter {
    windows: Mutex<Windows>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: Mutex::new(Windows {
                stamps: HashMap::new(),
                last_sweep: None,
            }),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window)
    }

    pub fn admit(&self, identity: &ClientIdentity, bucket: Bucket) -> Admission {
        self.admit_at(identity, bucket, Instant::now())
    }

    /// Prunes entries older than `now - window`, then admits and records `now`
    /// if fewer than `max_requests` remain. Denied calls are not recorded.
    /// At most once per window, keys with no live entries are dropped.
    pub fn admit_at(&self, identity: &ClientIdentity, bucket: Bucket, now: Instant) -> Admission {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        self.sweep(&mut windows, now);

        let timestamps = windows
            .stamps
            .entry((identity.clone(), bucket))
            .or_default();

        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            let retry_after = timestamps
                .front()
                .map(|&oldest| self.window.saturating_sub(now.saturating_duration_since(oldest)))
                .unwrap_or(self.window);
            if timestamps.is_empty() {
                windows.stamps.remove(&(identity.clone(), bucket));
            }
            return Admission::Denied { retry_after };
        }

        timestamps.push_back(now);
        Admission::Allowed { at: now }
    }

    /// Gives back a credit previously recorded at `at`.
    pub fn refund(&self, identity: &ClientIdentity, bucket: Bucket, at: Instant) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let key = (identity.clone(), bucket);
        if let Some(timestamps) = windows.stamps.get_mut(&key) {
            if let Some(pos) = timestamps.iter().rposition(|&t| t == at) {
                timestamps.remove(pos);
            }
            if timestamps.is_empty() {
                windows.stamps.remove(&key);
            }
        }
    }

    /// Number of (identity, bucket) pairs currently held.
    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .stamps
            .len()
    }

    fn sweep(&self, windows: &mut Windows, now: Instant) {
        let due = windows
            .last_sweep
            .map_or(true, |last| now.saturating_duration_since(last) >= self.window);
        if !due {
            return;
        }
        let window = self.window;
        windows.stamps.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|&newest| now.saturating_duration_since(newest) < window)
        });
        windows.last_sweep = Some(now);
    }
}
