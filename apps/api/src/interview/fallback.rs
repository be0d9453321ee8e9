//! Deterministic templated STAR answers, used whenever an upstream answer is
//! missing or unusable. No network calls.

use crate::interview::models::{escape_html, AnswerSet, StarAnswer, StarField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionCategory {
    Challenge,
    Teamwork,
    Learning,
    General,
}

const CHALLENGE_KEYWORDS: &[&str] = &["challenge", "difficult", "problem", "conflict", "fail", "pressure"];
const TEAMWORK_KEYWORDS: &[&str] = &["team", "collaborat", "colleague", "stakeholder", "cross-functional"];
const LEARNING_KEYWORDS: &[&str] = &["learn", "new", "skill", "grow", "improve"];

/// First matching category wins, in the order challenge → teamwork → learning.
pub fn categorize(question: &str) -> QuestionCategory {
    let q = question.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| q.contains(k));

    if has_any(CHALLENGE_KEYWORDS) {
        QuestionCategory::Challenge
    } else if has_any(TEAMWORK_KEYWORDS) {
        QuestionCategory::Teamwork
    } else if has_any(LEARNING_KEYWORDS) {
        QuestionCategory::Learning
    } else {
        QuestionCategory::General
    }
}

/// Templated answer for `question`, parameterized only by `job_title`.
pub fn fallback_answer(question: &str, job_title: &str) -> StarAnswer {
    templated(categorize(question), job_title)
}

/// Generic filler for one field, used when a parsed answer leaves it empty.
pub fn filler(field: StarField, job_title: &str) -> String {
    templated(QuestionCategory::General, job_title)
        .field(field)
        .to_string()
}

/// Inserts a fallback for every ordinal in `1..=questions.len()` that is missing.
/// Returns how many fallbacks were added.
pub fn fill_missing(answers: &mut AnswerSet, questions: &[String], job_title: &str) -> usize {
    let mut added = 0;
    for (i, question) in questions.iter().enumerate() {
        answers.entry(i + 1).or_insert_with(|| {
            added += 1;
            fallback_answer(question, job_title)
        });
    }
    added
}

fn templated(category: QuestionCategory, job_title: &str) -> StarAnswer {
    let job_title = escape_html(job_title);
    match category {
        QuestionCategory::Challenge => StarAnswer {
            situation: format!(
                "In a previous role I faced a difficult problem that put a key delivery for my team at risk, similar to challenges a {job_title} meets."
            ),
            task: "My task was to find the root cause quickly and keep the work on schedule.".to_string(),
            action: "I broke the problem into smaller parts, gathered data on each, and worked through the options with the people affected before committing to a fix.".to_string(),
            result: format!(
                "The issue was resolved without missing the deadline, and I came away with a repeatable approach to pressure that I would bring to the {job_title} role."
            ),
        },
        QuestionCategory::Teamwork => StarAnswer {
            situation: "On a recent project I worked with a cross-functional team whose members had different priorities.".to_string(),
            task: "I needed to help the group agree on a shared plan and deliver it together.".to_string(),
            action: "I set up regular check-ins, made responsibilities explicit, and made sure every viewpoint was heard before decisions were made.".to_string(),
            result: format!(
                "We delivered the project as a team, and the collaboration habits I built there are ones I would use as a {job_title}."
            ),
        },
        QuestionCategory::Learning => StarAnswer {
            situation: "A project I joined required a technology I had not used before.".to_string(),
            task: "I had to become productive with it quickly without slowing the team down.".to_string(),
            action: "I studied the documentation, built small prototypes, and asked experienced colleagues to review my early work.".to_string(),
            result: format!(
                "I was contributing within a few weeks, and that habit of learning fast is something I would bring to the {job_title} position."
            ),
        },
        QuestionCategory::General => StarAnswer {
            situation: format!(
                "In my role as mentioned in my resume, I encountered a situation where I needed to demonstrate skills relevant to {job_title}."
            ),
            task: "My task was to deliver results that align with the job requirements.".to_string(),
            action: "I took specific actions based on my experience and training.".to_string(),
            result: "As a result, I successfully achieved the objectives and gained valuable experience that makes me suitable for this position.".to_string(),
        },
    }
}
