//! Source file parsing and text extraction.

use std::fs;
use std::path::Path;
use veracity_core::{AppError, AppResult};

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Pdf,
    PlainText,
    Unsupported,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("pdf") => Self::Pdf,
            Some("txt") | Some("text") => Self::PlainText,
            _ => Self::Unsupported,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
            Self::PlainText => "text",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether `learn` picks up files of this type.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Parse a source file and extract clean text.
pub fn parse_file(path: &Path) -> AppResult<String> {
    let content_type = ContentType::from_path(path);

    let text = match content_type {
        ContentType::Pdf => extract_pdf(path)?,
        ContentType::Markdown => clean_markdown(&read_text(path)?),
        ContentType::PlainText => read_text(path)?,
        ContentType::Unsupported => {
            return Err(AppError::Knowledge(format!(
                "Unsupported file type: {:?}",
                path
            )))
        }
    };

    Ok(normalize_whitespace(&text))
}

fn read_text(path: &Path) -> AppResult<String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    if raw.contains('\0') {
        tracing::warn!("Skipping likely binary file: {:?}", path);
        return Err(AppError::Knowledge(format!(
            "Binary content in text file {:?}",
            path
        )));
    }

    Ok(raw)
}

fn extract_pdf(path: &Path) -> AppResult<String> {
    pdf_extract::extract_text(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to extract text from {:?}: {}", path, e)))
}

/// Clean markdown by removing excess formatting.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        // Horizontal rules and code fences carry no content
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        result.push_str(trimmed);
        result.push('\n');
    }

    result
}

/// Trim trailing spaces and collapse runs of blank lines to one.
fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        result.push_str(line);
        result.push('\n');
    }

    result.trim().to_string()
}
