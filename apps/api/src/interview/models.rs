use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State carried from question generation to answer generation.
/// Overwritten wholesale by each successful question-generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub job_title: String,
    /// Extracted résumé text after the configured character cap.
    pub resume_text: String,
    /// Ordinal `i` (1-based) is `questions[i - 1]`.
    pub questions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(job_title: String, resume_text: String, questions: Vec<String>) -> Self {
        Self {
            job_title,
            resume_text,
            questions,
            created_at: Utc::now(),
        }
    }
}

/// The four STAR components of a sample answer. Delivered field text is an
/// HTML fragment: model and user text is escaped, only `<strong>` is markup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarAnswer {
    pub situation: String,
    pub task: String,
    pub action: String,
    pub result: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarField {
    Situation,
    Task,
    Action,
    Result,
}

impl StarField {
    pub const ALL: [StarField; 4] = [
        StarField::Situation,
        StarField::Task,
        StarField::Action,
        StarField::Result,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StarField::Situation => "Situation",
            StarField::Task => "Task",
            StarField::Action => "Action",
            StarField::Result => "Result",
        }
    }
}

impl StarAnswer {
    pub fn field(&self, field: StarField) -> &str {
        match field {
            StarField::Situation => &self.situation,
            StarField::Task => &self.task,
            StarField::Action => &self.action,
            StarField::Result => &self.result,
        }
    }

    pub fn field_mut(&mut self, field: StarField) -> &mut String {
        match field {
            StarField::Situation => &mut self.situation,
            StarField::Task => &mut self.task,
            StarField::Action => &mut self.action,
            StarField::Result => &mut self.result,
        }
    }

    pub fn is_complete(&self) -> bool {
        StarField::ALL
            .iter()
            .all(|&f| !self.field(f).trim().is_empty())
    }

    /// Single-string rendering with emphasized labels, one component per line.
    pub fn formatted(&self) -> String {
        StarField::ALL
            .iter()
            .map(|&f| format!("<strong>{}:</strong> {}", f.label(), self.field(f)))
            .collect::<Vec<_>>()
            .join("<br>")
    }
}

/// Escapes the characters that would otherwise open markup or entities.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Ordinal (1..=N) → answer. Always total over the session's questions once delivered.
pub type AnswerSet = BTreeMap<usize, StarAnswer>;
