//! Résumé classification: one upstream round trip deciding whether the
//! extracted text is a résumé at all.

use tracing::info;

use crate::interview::extract::truncate_chars;
use crate::interview::prompts::{
    INVALID_TOKEN, QUESTIONS_MARKER, VALIDATION_PROMPT_TEMPLATE, VALID_TOKEN,
};
use crate::llm_client::{Upstream, UpstreamError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    /// Human-readable reason, possibly empty.
    Rejected(String),
}

/// Valid only if the reply begins with `VALID_RESUME` (after whitespace and
/// markdown emphasis). Anything else is a rejection carrying the remainder.
pub fn parse_verdict(reply: &str) -> Verdict {
    let reply = strip_emphasis(reply);
    if reply.starts_with(VALID_TOKEN) {
        return Verdict::Valid;
    }
    Verdict::Rejected(clean_reason(&reply.replace(INVALID_TOKEN, "")))
}

/// Verdict for a fused reply: `NOT_RESUME` anywhere rejects, with the reason
/// taken from the text after the token up to the questions marker.
pub fn parse_fused_verdict(reply: &str) -> Verdict {
    match reply.find(INVALID_TOKEN) {
        Some(idx) => {
            let rest = &reply[idx + INVALID_TOKEN.len()..];
            let rest = rest.split(QUESTIONS_MARKER).next().unwrap_or_default();
            Verdict::Rejected(clean_reason(rest))
        }
        None => Verdict::Valid,
    }
}

/// Classifies the first `max_chars` characters of `resume_text`.
pub async fn validate_resume(
    upstream: &Upstream,
    resume_text: &str,
    max_chars: usize,
) -> Result<Verdict, UpstreamError> {
    let prompt = VALIDATION_PROMPT_TEMPLATE
        .replace("{resume_text}", truncate_chars(resume_text, max_chars));
    let reply = upstream.complete(&prompt).await?;
    let verdict = parse_verdict(&reply);
    info!("Resume validation verdict: {}", verdict_kind(&verdict));
    Ok(verdict)
}

fn verdict_kind(verdict: &Verdict) -> &'static str {
    match verdict {
        Verdict::Valid => "valid",
        Verdict::Rejected(_) => "rejected",
    }
}

fn strip_emphasis(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '_' | '"' | '`'))
}

fn clean_reason(text: &str) -> String {
    text.trim()
        .trim_start_matches(|c: char| matches!(c, ':' | '-' | '*' | '_' | '.') || c.is_whitespace())
        .trim_end_matches(|c: char| matches!(c, '*' | '_') || c.is_whitespace())
        .to_string()
}
