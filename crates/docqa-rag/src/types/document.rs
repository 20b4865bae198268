//! Document and chunk types with source tracking for references

use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::{Error, Result};

const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Supported source kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Plain text file
    Text,
    /// Markdown file
    Markdown,
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Word,
}

impl SourceType {
    /// Resolve the source kind from a declared content type, falling back to
    /// the filename extension when the content type is missing or generic.
    pub fn resolve(content_type: Option<&str>, filename: &str) -> Result<Self> {
        let declared = content_type
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty());

        if let Some(ct) = declared.as_deref() {
            if let Some(kind) = Self::from_mime(ct) {
                return Ok(kind);
            }
            if ct != "application/octet-stream" {
                return Err(Error::UnsupportedFormat {
                    filename: filename.to_string(),
                    declared: ct.to_string(),
                });
            }
        }

        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        Self::from_extension(ext)
            .or_else(|| {
                mime_guess::from_path(filename)
                    .iter()
                    .find_map(|m| Self::from_mime(m.essence_str()))
            })
            .ok_or_else(|| Error::UnsupportedFormat {
                filename: filename.to_string(),
                declared: declared.unwrap_or_else(|| format!(".{}", ext)),
            })
    }

    /// Map a MIME essence to a source kind
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "text/plain" => Some(Self::Text),
            "text/markdown" | "text/x-markdown" => Some(Self::Markdown),
            "application/pdf" => Some(Self::Pdf),
            MIME_DOCX => Some(Self::Word),
            _ => None,
        }
    }

    /// Map a filename extension to a source kind
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Word),
            _ => None,
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Text => "Text File",
            Self::Markdown => "Markdown",
            Self::Pdf => "PDF",
            Self::Word => "Word Document (.docx)",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A document that has been ingested
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Original filename as uploaded by user
    pub filename: String,
    /// Source kind
    pub source_type: SourceType,
    /// Normalized extracted text
    pub text: String,
    /// SHA-256 of the normalized text
    pub content_hash: String,
    /// Total number of pages (if applicable)
    pub total_pages: Option<u32>,
    /// File size in bytes
    pub file_size: u64,
    /// Upload timestamp
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
    /// Number of chunks created
    pub chunk_count: u32,
}

impl Document {
    /// Create a new document
    pub fn new(
        filename: impl Into<String>,
        source_type: SourceType,
        text: String,
        content_hash: String,
        file_size: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            source_type,
            text,
            content_hash,
            total_pages: None,
            file_size,
            uploaded_at: chrono::Utc::now(),
            chunk_count: 0,
        }
    }

    /// Set page count
    pub fn with_pages(mut self, pages: Option<u32>) -> Self {
        self.total_pages = pages;
        self
    }
}

/// Where a chunk came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkSource {
    /// Source filename
    pub filename: String,
    /// Source kind
    pub source_type: SourceType,
    /// Byte offset of the chunk start in the document text
    pub byte_start: usize,
    /// Byte offset one past the chunk end
    pub byte_end: usize,
}

/// A stored passage of a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: Uuid,
    /// Position within the document, starting at 0
    pub ordinal: u32,
    /// Passage text
    pub text: String,
    /// Source location
    pub source: ChunkSource,
}

/// A chunk waiting to be inserted, together with its embedding
#[derive(Debug, Clone)]
pub struct NewChunk {
    /// Passage text
    pub text: String,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Position within the document
    pub ordinal: u32,
    /// Source location
    pub source: ChunkSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_from_content_type() {
        assert_eq!(
            SourceType::resolve(Some("application/pdf"), "report.bin").unwrap(),
            SourceType::Pdf
        );
        assert_eq!(
            SourceType::resolve(Some("text/plain; charset=utf-8"), "notes").unwrap(),
            SourceType::Text
        );
        assert_eq!(
            SourceType::resolve(Some(MIME_DOCX), "x").unwrap(),
            SourceType::Word
        );
    }

    #[test]
    fn test_resolve_falls_back_to_extension() {
        assert_eq!(
            SourceType::resolve(None, "README.md").unwrap(),
            SourceType::Markdown
        );
        assert_eq!(
            SourceType::resolve(Some("application/octet-stream"), "Spec.DOCX").unwrap(),
            SourceType::Word
        );
    }

    #[test]
    fn test_resolve_rejects_unknown() {
        let err = SourceType::resolve(Some("image/png"), "cat.png").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));

        let err = SourceType::resolve(None, "archive.zip").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }
}
