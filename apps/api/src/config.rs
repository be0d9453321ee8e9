use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// How résumé validation is issued relative to question generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// One classification round trip, then one question round trip.
    Separate,
    /// A single prompt asking for both the verdict and the question list.
    Fused,
}

impl FromStr for ValidationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "separate" => Ok(Self::Separate),
            "fused" => Ok(Self::Fused),
            other => bail!("unknown validation mode '{other}' (expected 'separate' or 'fused')"),
        }
    }
}

/// How STAR answers are requested from the upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    Batch,
    PerQuestion,
}

impl FromStr for AnswerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batch" => Ok(Self::Batch),
            "per_question" | "per-question" => Ok(Self::PerQuestion),
            other => bail!("unknown answer mode '{other}' (expected 'batch' or 'per_question')"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Redis { url: String },
}

/// Client-facing rate limit settings.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: usize,
    /// When false, a request whose document is rejected as a non-résumé gives its credit back.
    pub count_rejected: bool,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP` instead of the peer
    /// address. Only safe behind a proxy that overwrites those headers.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(3600),
            max_requests: 10,
            count_rejected: true,
            trust_forwarded_for: false,
        }
    }
}

/// Knobs for the question/answer pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub question_count_target: usize,
    pub question_count_min: usize,
    pub question_min_chars: usize,
    pub resume_text_max_chars: usize,
    pub validation_text_max_chars: usize,
    pub pdf_max_pages: usize,
    pub max_upload_bytes: usize,
    pub validation_mode: ValidationMode,
    pub answer_mode: AnswerMode,
    pub answer_pacing: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            question_count_target: 10,
            question_count_min: 5,
            question_min_chars: 15,
            resume_text_max_chars: 4000,
            validation_text_max_chars: 2000,
            pdf_max_pages: 3,
            max_upload_bytes: 16 * 1024 * 1024,
            validation_mode: ValidationMode::Separate,
            answer_mode: AnswerMode::Batch,
            answer_pacing: Duration::from_millis(500),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Only the API key is required; everything else has a default.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub model: String,
    pub port: u16,
    pub rust_log: String,
    pub rate_limit: RateLimitConfig,
    pub retry_max_attempts: u32,
    pub retry_initial_delay: Duration,
    pub pipeline: PipelineConfig,
    pub session_backend: SessionBackend,
    pub session_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key → value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = PipelineConfig::default();

        let pipeline = PipelineConfig {
            question_count_target: env.or("QUESTION_COUNT_TARGET", defaults.question_count_target)?,
            question_count_min: env.or("QUESTION_COUNT_MIN", defaults.question_count_min)?,
            question_min_chars: env.or("QUESTION_MIN_CHARS", defaults.question_min_chars)?,
            resume_text_max_chars: env.or("RESUME_TEXT_MAX_CHARS", defaults.resume_text_max_chars)?,
            validation_text_max_chars: env
                .or("VALIDATION_TEXT_MAX_CHARS", defaults.validation_text_max_chars)?,
            pdf_max_pages: env.or("PDF_MAX_PAGES", defaults.pdf_max_pages)?,
            max_upload_bytes: env.or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            validation_mode: env.or("VALIDATION_MODE", defaults.validation_mode)?,
            answer_mode: env.or("ANSWER_MODE", defaults.answer_mode)?,
            answer_pacing: env.millis_or("ANSWER_PACING_MS", defaults.answer_pacing)?,
        };

        if pipeline.question_count_min > pipeline.question_count_target {
            bail!(
                "QUESTION_COUNT_MIN ({}) must not exceed QUESTION_COUNT_TARGET ({})",
                pipeline.question_count_min,
                pipeline.question_count_target
            );
        }

        let session_backend = match env
            .string_or("SESSION_BACKEND", "memory")
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => SessionBackend::Memory,
            "redis" => SessionBackend::Redis {
                url: env.require("REDIS_URL")?,
            },
            other => bail!("unknown SESSION_BACKEND '{other}' (expected 'memory' or 'redis')"),
        };

        let limits = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            window: Duration::from_secs(
                env.or("RATE_LIMIT_WINDOW_SECONDS", limits.window.as_secs())?,
            ),
            max_requests: env.or("RATE_LIMIT_MAX_REQUESTS", limits.max_requests)?,
            count_rejected: env.or("RATE_LIMIT_COUNT_REJECTED", limits.count_rejected)?,
            trust_forwarded_for: env.or("TRUST_FORWARDED_FOR", limits.trust_forwarded_for)?,
        };

        Ok(Config {
            anthropic_api_key: env.require("ANTHROPIC_API_KEY")?,
            model: env.string_or("LLM_MODEL", "claude-sonnet-4-5"),
            port: env.or("PORT", 8080)?,
            rust_log: env.string_or("RUST_LOG", "info"),
            rate_limit,
            retry_max_attempts: env.or("RETRY_MAX_ATTEMPTS", 3)?,
            retry_initial_delay: env.millis_or("RETRY_INITIAL_DELAY_MS", Duration::from_secs(1))?,
            pipeline,
            session_backend,
            session_ttl: Duration::from_secs(env.or("SESSION_TTL_SECONDS", 3600)?),
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn require(&self, key: &str) -> Result<String> {
        (self.0)(key).with_context(|| format!("Required environment variable '{key}' is not set"))
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        (self.0)(key).unwrap_or_else(|| default.to_string())
    }

    /// Parses an optional variable, falling back to `default` when unset.
    fn or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.0)(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
            None => Ok(default),
        }
    }

    fn millis_or(&self, key: &str, default: Duration) -> Result<Duration> {
        let millis = self.or(key, u64::try_from(default.as_millis()).unwrap_or(u64::MAX))?;
        Ok(Duration::from_millis(millis))
    }
}
