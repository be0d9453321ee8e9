/// LLM Client: the single point of entry for all upstream completion calls.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// All LLM interactions MUST go through `Upstream`, which pairs a provider
/// with the one `RetryPolicy` allowed to retry it.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod prompts;
pub mod retry;

pub use retry::RetryPolicy;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Classified failure of one upstream call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Upstream internal error, overload or network hiccup. Retryable.
    #[error("upstream temporarily unavailable: {0}")]
    Transient(String),

    /// Upstream rate or budget limit. Retryable.
    #[error("upstream quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("upstream call failed: {0}")]
    Fatal(String),
}

impl UpstreamError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::QuotaExceeded(_))
    }

    /// Maps an HTTP status and body to an error class.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => Self::QuotaExceeded(message),
            500..=599 => Self::Transient(message),
            _ => Self::Fatal(format!("status {status}: {message}")),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Self::Transient(e.to_string())
        } else {
            Self::Fatal(e.to_string())
        }
    }
}

/// "Given a prompt string, return a completion string."
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Anthropic Messages API client. Makes exactly one HTTP call per `complete`.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError> {
        let request_body = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: prompts::INTERVIEW_COACH_SYSTEM,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(UpstreamError::from_status(status.as_u16(), message));
        }

        let llm_response: LlmResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Fatal(format!("malformed response body: {e}")))?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        llm_response
            .text()
            .map(str::to_string)
            .ok_or_else(|| UpstreamError::Fatal("LLM returned empty content".to_string()))
    }
}

/// A completion provider paired with the retry policy that guards it.
#[derive(Clone)]
pub struct Upstream {
    provider: Arc<dyn CompletionProvider>,
    retry: RetryPolicy,
}

impl Upstream {
    pub fn new(provider: Arc<dyn CompletionProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// One logical call: the provider is invoked until success, a fatal error,
    /// or the retry budget runs out.
    pub async fn complete(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.retry
            .execute(|| self.provider.complete(prompt))
            .await
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted provider for exercising the pipeline without the network.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays queued results in order and records every prompt it receives.
    /// Once the queue drains, every further call is `Fatal`.
    #[derive(Default)]
    pub struct ScriptedCompletion {
        responses: Mutex<VecDeque<Result<String, UpstreamError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompletion {
        pub fn new(responses: Vec<Result<String, UpstreamError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn replying(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, UpstreamError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(UpstreamError::Fatal("script exhausted".to_string())))
        }
    }

    /// An `Upstream` over `provider` with no retries and no delay.
    pub fn upstream(provider: Arc<ScriptedCompletion>) -> Upstream {
        Upstream::new(provider, RetryPolicy::new(0, Duration::ZERO))
    }
}
