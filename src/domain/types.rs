//! Core value types shared across the document pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::error::DomainError;

/// Upper bound on accepted document titles.
pub const MAX_TITLE_LEN: usize = 300;

/// Trim and validate a caller-supplied document title.
pub fn validate_title(title: &str) -> Result<&str, DomainError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("title must not be empty"));
    }
    if trimmed.len() > MAX_TITLE_LEN {
        return Err(DomainError::validation("title is too long"));
    }
    Ok(trimmed)
}

/// Source markup flavour of a document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Markdown,
    Html,
}

impl ContentFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentFormat::Markdown => "markdown",
            ContentFormat::Html => "html",
        }
    }

    /// Default source-file extension for raw text content in this format.
    pub fn source_extension(self) -> &'static str {
        match self {
            ContentFormat::Markdown => ".md",
            ContentFormat::Html => ".html",
        }
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown content format `{0}`")]
pub struct ParseContentFormatError(String);

impl FromStr for ContentFormat {
    type Err = ParseContentFormatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "markdown" => Ok(ContentFormat::Markdown),
            "html" => Ok(ContentFormat::Html),
            other => Err(ParseContentFormatError(other.to_string())),
        }
    }
}

/// Classification of an uploaded file by its extension.
///
/// Unrecognised extensions are rejected before any side effect occurs.
pub fn format_for_upload(filename: &str) -> Option<(ContentFormat, String)> {
    let lowered = filename.to_ascii_lowercase();
    let extension = std::path::Path::new(&lowered)
        .extension()
        .and_then(|ext| ext.to_str())?;

    let format = match extension {
        "md" | "markdown" | "txt" => ContentFormat::Markdown,
        "html" | "htm" => ContentFormat::Html,
        _ => return None,
    };

    Some((format, format!(".{extension}")))
}

/// File stem of an uploaded file, used as the document title on create.
pub fn upload_title(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("Untitled")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_markdown_extensions() {
        for name in ["notes.md", "notes.MARKDOWN", "notes.txt"] {
            let (format, _) = format_for_upload(name).expect("supported");
            assert_eq!(format, ContentFormat::Markdown);
        }
    }

    #[test]
    fn recognises_html_extensions() {
        let (format, ext) = format_for_upload("page.HTM").expect("supported");
        assert_eq!(format, ContentFormat::Html);
        assert_eq!(ext, ".htm");
    }

    #[test]
    fn rejects_unknown_extensions() {
        assert!(format_for_upload("notes.pdf").is_none());
        assert!(format_for_upload("archive.tar.gz").is_none());
        assert!(format_for_upload("no-extension").is_none());
    }

    #[test]
    fn upload_title_strips_extension() {
        assert_eq!(upload_title("weekly report.md"), "weekly report");
        assert_eq!(upload_title(".hidden"), "Untitled");
    }

    #[test]
    fn titles_are_trimmed_and_bounded() {
        assert_eq!(validate_title("  Report  "), Ok("Report"));
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN + 1)).is_err());
    }

    #[test]
    fn format_round_trips_through_str() {
        for format in [ContentFormat::Markdown, ContentFormat::Html] {
            assert_eq!(format.as_str().parse::<ContentFormat>().unwrap(), format);
        }
    }
}
