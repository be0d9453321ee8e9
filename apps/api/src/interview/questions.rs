//! Interview question generation.
//!
//! Flow: (validate) → build prompt → one upstream call → parse numbered list
//! → enforce count floor → `SessionContext`.

use tracing::{info, warn};

use crate::config::{PipelineConfig, ValidationMode};
use crate::errors::AppError;
use crate::interview::extract::truncate_chars;
use crate::interview::models::SessionContext;
use crate::interview::prompts::{
    FUSED_PROMPT_TEMPLATE, QUESTIONS_MARKER, QUESTIONS_PROMPT_TEMPLATE,
};
use crate::interview::validator::{parse_fused_verdict, validate_resume, Verdict};
use crate::llm_client::Upstream;

/// Extracts up to `target` questions from a free-form numbered list.
///
/// Per line: trim and skip blanks; only lines starting with an ASCII digit or
/// `Q` are candidates; the body is the text after the first `.`, else after the
/// first `)`, else the whole line; bodies of `min_chars` characters or fewer
/// are discarded as headers or truncation artifacts.
pub fn parse_questions(text: &str, target: usize, min_chars: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| line.starts_with(|c: char| c.is_ascii_digit() || c == 'Q'))
        .map(question_body)
        .filter(|body| body.chars().count() > min_chars)
        .take(target)
        .map(str::to_string)
        .collect()
}

fn question_body(line: &str) -> &str {
    let body = if let Some((_, rest)) = line.split_once('.') {
        rest
    } else if let Some((_, rest)) = line.split_once(')') {
        rest
    } else {
        line
    };
    body.trim()
}

/// The part of a fused reply eligible for question parsing: everything after
/// the first `QUESTIONS:` marker, or the whole reply when the marker is missing.
pub fn questions_section(reply: &str) -> &str {
    match reply.find(QUESTIONS_MARKER) {
        Some(idx) => &reply[idx + QUESTIONS_MARKER.len()..],
        None => reply,
    }
}

/// Runs validation and question generation for an uploaded résumé and returns
/// the session state to store. Nothing is persisted here.
pub async fn generate_questions(
    upstream: &Upstream,
    config: &PipelineConfig,
    resume_text: &str,
    job_title: &str,
) -> Result<SessionContext, AppError> {
    let resume_text = truncate_chars(resume_text, config.resume_text_max_chars);

    let questions = match config.validation_mode {
        ValidationMode::Separate => {
            if let Verdict::Rejected(reason) =
                validate_resume(upstream, resume_text, config.validation_text_max_chars).await?
            {
                return Err(AppError::ResumeRejected(reason));
            }

            let prompt = fill_template(QUESTIONS_PROMPT_TEMPLATE, config, resume_text, job_title);
            let reply = upstream.complete(&prompt).await?;
            parse_questions(&reply, config.question_count_target, config.question_min_chars)
        }
        ValidationMode::Fused => {
            let prompt = fill_template(FUSED_PROMPT_TEMPLATE, config, resume_text, job_title);
            let reply = upstream.complete(&prompt).await?;
            if let Verdict::Rejected(reason) = parse_fused_verdict(&reply) {
                info!("Fused call rejected the document");
                return Err(AppError::ResumeRejected(reason));
            }
            parse_questions(
                questions_section(&reply),
                config.question_count_target,
                config.question_min_chars,
            )
        }
    };

    if questions.len() < config.question_count_min {
        warn!(
            "Parsed only {} questions (min {}, target {})",
            questions.len(),
            config.question_count_min,
            config.question_count_target
        );
        return Err(AppError::InsufficientQuestions {
            found: questions.len(),
            min: config.question_count_min,
        });
    }
    if questions.len() < config.question_count_target {
        warn!(
            "Parsed {} of {} requested questions; continuing",
            questions.len(),
            config.question_count_target
        );
    }

    info!(
        "Generated {} questions for job title of {} chars",
        questions.len(),
        job_title.chars().count()
    );

    Ok(SessionContext::new(
        job_title.to_string(),
        resume_text.to_string(),
        questions,
    ))
}

fn fill_template(
    template: &str,
    config: &PipelineConfig,
    resume_text: &str,
    job_title: &str,
) -> String {
    template
        .replace("{count}", &config.question_count_target.to_string())
        .replace("{job_title}", job_title)
        .replace("{resume_text}", resume_text)
}

#[cfg(test)]
pub mod fixtures {
    /// A well-formed ten-question reply.
    pub const TEN_QUESTIONS: &str = "\
Here are your questions:

1. Walk me through the payment service you built at X.
2. How did you decide between Python and Go for the ingestion jobs?
3. Describe a time you optimized a slow SQL query in production.
4. How would you design a rate limiter for a public API?
5. Tell me about a disagreement with a teammate and how you resolved it.
6. What testing strategy did you use for your backend services?
7. How do you approach schema migrations with zero downtime?
8. Describe the most difficult outage you have debugged.
9. How do you keep up with new backend technologies?
10. Why are you interested in this Backend Engineer position?";
}
