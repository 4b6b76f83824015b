//! Text extraction for uploaded documents (PDF, plain text).
//!
//! Extraction takes raw bytes plus the declared media type and returns plain
//! UTF-8 text. PDF extraction is deliberately lenient: an image-only or
//! unreadable PDF does not fail the pipeline. Instead a fixed placeholder
//! explaining the likely cause is carried forward as the document's text, so
//! the document still reaches a terminal status. The placeholder case is
//! tagged ([`Extracted::Placeholder`]) rather than signalled through the
//! string itself, so callers and tests can distinguish it without matching
//! prose.

use crate::models::{MIME_PDF, MIME_TEXT};

/// Shown when a PDF parses but yields no text (scanned/image-only content).
const IMAGE_ONLY_PLACEHOLDER: &str = "This PDF appears to contain primarily images or scanned \
content. Text extraction was not successful. Please ensure the PDF contains selectable text or \
consider using OCR processing for image-based documents.";

/// Shown when PDF parsing fails outright, including after the fallback pass.
const UNREADABLE_PLACEHOLDER: &str = "Unable to extract text from this PDF file. This could be due to:
1. The PDF contains only images/scanned content (requires OCR)
2. The PDF is password protected
3. The PDF format is not supported
4. The file may be corrupted

Please try uploading a text-based PDF or a .txt file instead.";

/// Why a placeholder was produced instead of real text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// The PDF parsed but contained no extractable text.
    ImageOnly,
    /// The PDF could not be parsed at all (corrupt, encrypted, unsupported).
    Unreadable,
}

impl PlaceholderKind {
    /// The fixed human-readable text stored for this placeholder.
    pub fn text(&self) -> &'static str {
        match self {
            PlaceholderKind::ImageOnly => IMAGE_ONLY_PLACEHOLDER,
            PlaceholderKind::Unreadable => UNREADABLE_PLACEHOLDER,
        }
    }
}

/// Extraction result: real document text, or a diagnostic placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Text(String),
    Placeholder(PlaceholderKind),
}

impl Extracted {
    /// The text that flows into chunking and storage. Placeholder text is
    /// non-empty by construction, so a placeholder document still completes.
    pub fn into_text(self) -> String {
        match self {
            Extracted::Text(text) => text,
            Extracted::Placeholder(kind) => kind.text().to_string(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Extracted::Placeholder(_))
    }
}

/// Extraction error. Unlike placeholder PDFs, these do abort ingestion.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedMediaType(String),
    InvalidUtf8,
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedMediaType(mt) => {
                write!(f, "unsupported media type: {}", mt)
            }
            ExtractError::InvalidUtf8 => write!(f, "file is not valid UTF-8 text"),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extracts plain text from uploaded bytes according to the declared media type.
///
/// - `text/plain`: strict UTF-8 decode; undecodable bytes are an error.
/// - `application/pdf`: structural extraction with one fallback attempt;
///   never fails — degraded outcomes become [`Extracted::Placeholder`].
pub fn extract_text(bytes: &[u8], media_type: &str) -> Result<Extracted, ExtractError> {
    match media_type {
        MIME_TEXT => {
            let text =
                String::from_utf8(bytes.to_vec()).map_err(|_| ExtractError::InvalidUtf8)?;
            Ok(Extracted::Text(text))
        }
        MIME_PDF => Ok(extract_pdf(bytes)),
        other => Err(ExtractError::UnsupportedMediaType(other.to_string())),
    }
}

fn extract_pdf(bytes: &[u8]) -> Extracted {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Extracted::Placeholder(PlaceholderKind::ImageOnly)
            } else {
                Extracted::Text(trimmed.to_string())
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "PDF extraction failed, attempting fallback");
            extract_pdf_fallback(bytes)
        }
    }
}

/// Single retry with per-page extraction; some documents that fail whole-file
/// extraction still yield text page by page.
fn extract_pdf_fallback(bytes: &[u8]) -> Extracted {
    match pdf_extract::extract_text_from_mem_by_pages(bytes) {
        Ok(pages) => {
            let text = pages.join("\n");
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Extracted::Placeholder(PlaceholderKind::Unreadable)
            } else {
                Extracted::Text(trimmed.to_string())
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "fallback PDF extraction also failed");
            Extracted::Placeholder(PlaceholderKind::Unreadable)
        }
    }
}
