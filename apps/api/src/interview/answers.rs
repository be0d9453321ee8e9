//! STAR answer generation.
//!
//! Two strategies:
//! - batch: one prompt for all questions, reply split on `ANSWER_<n>:` markers
//! - per-question: one paced upstream call per question
//!
//! Either way the returned set is total over the session's ordinals. Anything
//! missing or unusable is filled from `fallback`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::config::{AnswerMode, PipelineConfig};
use crate::interview::fallback::{fill_missing, filler};
use crate::interview::models::{escape_html, AnswerSet, SessionContext, StarAnswer, StarField};
use crate::interview::prompts::{
    BATCH_ANSWERS_PROMPT_TEMPLATE, SINGLE_ANSWER_PROMPT_TEMPLATE, STAR_GUIDELINES,
};
use crate::llm_client::prompts::FIRST_PERSON_INSTRUCTION;
use crate::llm_client::Upstream;

/// A parsed answer block must be longer than this to count.
pub const MIN_ANSWER_CHARS: usize = 20;

static ANSWER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ANSWER_(\d+):").expect("static regex"));

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("static regex"));

/// Splits a batch reply into `ordinal → block`. Each block runs from its
/// marker to the next marker or end of text. The first block for an ordinal wins.
/// Emphasis wrapped around the markers themselves (`**ANSWER_1:**`) is dropped.
pub fn split_answer_blocks(reply: &str) -> BTreeMap<usize, &str> {
    let markers: Vec<_> = ANSWER_MARKER.captures_iter(reply).collect();
    let mut blocks = BTreeMap::new();

    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Ok(ordinal) = number.as_str().parse::<usize>() else {
            continue;
        };
        let next = markers.get(i + 1).and_then(|next| next.get(0));
        let end = next.map_or(reply.len(), |m| m.start());
        blocks
            .entry(ordinal)
            .or_insert_with(|| strip_marker_emphasis(&reply[whole.end()..end], next.is_some()));
    }
    blocks
}

/// Removes the `**` closing a bold marker directly after it, and, when another
/// marker follows, an unpaired trailing `**` that opens that marker.
fn strip_marker_emphasis(raw: &str, before_marker: bool) -> &str {
    let mut block = raw.strip_prefix("**").unwrap_or(raw).trim();
    if before_marker && block.matches("**").count() % 2 == 1 {
        if let Some(rest) = block.strip_suffix("**") {
            block = rest.trim_end();
        }
    }
    block
}

/// Recognizes a `Situation:`-style label at the start of a line, tolerating
/// list bullets, markdown emphasis and any letter case. Returns the field and
/// the text after the colon.
fn match_label(line: &str) -> Option<(StarField, &str)> {
    let cleaned = line.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, '-' | '*' | '_' | '#' | '•' | '>')
    });

    StarField::ALL.into_iter().find_map(|field| {
        let label = field.label();
        let head = cleaned.get(..label.len())?;
        if !head.eq_ignore_ascii_case(label) {
            return None;
        }
        let rest = cleaned[label.len()..].trim_start_matches(['*', '_']);
        let rest = rest.strip_prefix(':')?;
        Some((
            field,
            rest.trim_start_matches(|c: char| c.is_whitespace() || c == '*' || c == '_'),
        ))
    })
}

/// Decomposes one answer block into STAR fields. Text after a label, across
/// continuation lines until the next label, belongs to that field. Unlabeled
/// text before the first label becomes the situation if none was given.
pub fn parse_star(block: &str) -> StarAnswer {
    let mut answer = StarAnswer::default();
    let mut current: Option<StarField> = None;
    let mut preamble: Vec<&str> = Vec::new();

    for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some((field, rest)) = match_label(line) {
            current = Some(field);
            append(answer.field_mut(field), rest);
        } else if let Some(field) = current {
            append(answer.field_mut(field), line);
        } else {
            preamble.push(line);
        }
    }

    if answer.situation.is_empty() && !preamble.is_empty() {
        answer.situation = preamble.join(" ");
    }
    answer
}

fn append(target: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

/// Renders one field for delivery: the text is HTML-escaped, bold markers
/// become `<strong>`, a terminator is added if missing, and an empty field
/// gets filler text.
fn finish_field(text: &str, field: StarField, job_title: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return filler(field, job_title);
    }
    let escaped = escape_html(text);
    let mut rendered = BOLD.replace_all(&escaped, "<strong>$1</strong>").into_owned();
    if !rendered.ends_with(['.', '!', '?']) {
        rendered.push('.');
    }
    rendered
}

/// Accepts `block` if it is substantial, returning the delivered answer.
pub fn accept_answer(block: &str, job_title: &str) -> Option<StarAnswer> {
    if block.trim().chars().count() <= MIN_ANSWER_CHARS {
        return None;
    }
    let raw = parse_star(block);
    let mut answer = StarAnswer::default();
    for field in StarField::ALL {
        *answer.field_mut(field) = finish_field(raw.field(field), field, job_title);
    }
    Some(answer)
}

/// Generates an answer for every question in `session`. Never fails: upstream
/// or parse failures degrade to templated answers.
pub async fn generate_answers(
    upstream: &Upstream,
    config: &PipelineConfig,
    session: &SessionContext,
) -> AnswerSet {
    let mut answers = match config.answer_mode {
        AnswerMode::Batch => generate_batch(upstream, session).await,
        AnswerMode::PerQuestion => generate_per_question(upstream, config, session).await,
    };

    let fallbacks = fill_missing(&mut answers, &session.questions, &session.job_title);
    debug_assert!(answers.values().all(StarAnswer::is_complete));
    if fallbacks > 0 {
        warn!(
            "{} of {} answers used the fallback template",
            fallbacks,
            session.questions.len()
        );
    }
    info!(
        "Delivered {} answers ({:?} mode)",
        answers.len(),
        config.answer_mode
    );
    answers
}

async fn generate_batch(upstream: &Upstream, session: &SessionContext) -> AnswerSet {
    let questions = session
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {q}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = fill_common(BATCH_ANSWERS_PROMPT_TEMPLATE, session).replace("{questions}", &questions);

    let reply = match upstream.complete(&prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Batch answer call failed, falling back for all questions: {e}");
            return AnswerSet::new();
        }
    };

    let total = session.questions.len();
    split_answer_blocks(&reply)
        .into_iter()
        .filter(|(ordinal, _)| (1..=total).contains(ordinal))
        .filter_map(|(ordinal, block)| {
            let answer = accept_answer(block, &session.job_title);
            if answer.is_none() {
                warn!("Answer {ordinal} too short to use");
            }
            answer.map(|a| (ordinal, a))
        })
        .collect()
}

/// Calls are strictly sequential with `answer_pacing` between them, so one
/// slow or failing question never affects another's ordinal.
async fn generate_per_question(
    upstream: &Upstream,
    config: &PipelineConfig,
    session: &SessionContext,
) -> AnswerSet {
    let template = fill_common(SINGLE_ANSWER_PROMPT_TEMPLATE, session);
    let mut answers = AnswerSet::new();

    for (i, question) in session.questions.iter().enumerate() {
        let ordinal = i + 1;
        if i > 0 && !config.answer_pacing.is_zero() {
            tokio::time::sleep(config.answer_pacing).await;
        }

        let prompt = template.replace("{question}", question);
        match upstream.complete(&prompt).await {
            Ok(reply) => match accept_answer(&reply, &session.job_title) {
                Some(answer) => {
                    answers.insert(ordinal, answer);
                }
                None => warn!("Answer {ordinal} too short to use"),
            },
            Err(e) => warn!("Answer {ordinal} failed upstream: {e}"),
        }
    }
    answers
}

fn fill_common(template: &str, session: &SessionContext) -> String {
    template
        .replace("{star_guidelines}", STAR_GUIDELINES)
        .replace("{voice_instruction}", FIRST_PERSON_INSTRUCTION)
        .replace("{job_title}", &session.job_title)
        .replace("{resume_text}", &session.resume_text)
}

#[cfg(test)]
pub mod fixtures {
    /// A well-formed per-question STAR reply.
    pub const STAR_REPLY: &str = "\
**Situation:** Our nightly ETL job at X regularly overran its window
and delayed morning reports.
**Task:** I was asked to bring it under two hours.
**Action:** I rewrote the heaviest SQL joins and parallelized extraction in Python
**Result:** Runtime dropped from five hours to ninety minutes!";
}
