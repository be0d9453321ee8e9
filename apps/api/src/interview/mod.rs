// Interview preparation pipeline.
// Implements: text extraction, résumé validation, question generation,
// STAR answer generation with templated fallbacks.
// All LLM calls go through llm_client::Upstream.

pub mod answers;
pub mod extract;
pub mod fallback;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod questions;
pub mod validator;
