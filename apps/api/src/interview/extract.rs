//! Résumé text extraction. PDF parsing is CPU-bound and must run inside
//! `tokio::task::spawn_blocking`.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Error reading PDF file: {0}")]
    Unreadable(String),

    #[error("Could not extract text from PDF")]
    NoText,
}

/// "Given a file, return extracted text per page."
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ExtractionError::Unreadable(e.to_string()))
    }
}

/// Joins the non-empty text of the first `max_pages` pages with newlines.
pub fn assemble_pages(pages: &[String], max_pages: usize) -> Result<String, ExtractionError> {
    let text = pages
        .iter()
        .take(max_pages)
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        return Err(ExtractionError::NoText);
    }
    Ok(text)
}

/// Extracts on the blocking pool. A panicking extractor is reported as unreadable.
pub async fn extract_resume_text(
    extractor: Arc<dyn TextExtractor>,
    file: Bytes,
    max_pages: usize,
) -> Result<String, ExtractionError> {
    let pages = tokio::task::spawn_blocking(move || extractor.extract_pages(&file))
        .await
        .map_err(|e| ExtractionError::Unreadable(format!("extractor aborted: {e}")))??;

    let text = assemble_pages(&pages, max_pages)?;
    debug!(
        "Extracted {} chars from {} of {} pages",
        text.chars().count(),
        pages.len().min(max_pages),
        pages.len()
    );
    Ok(text)
}

/// Truncates to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
