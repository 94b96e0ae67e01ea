//! # Documents Module
//!
//! Supporting-document rules: accepted kinds and content types, upload
//! validation and stored metadata.
//!
//! Writing bytes to disk is done by the app layer. This module decides
//! whether an upload is acceptable and what it is called on disk.

use crate::validation::ValidationErrors;
use crate::{DocumentId, EligoError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum length of a sanitized file name.
pub const MAX_FILE_NAME_LEN: usize = 100;

/// What a document is meant to prove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Identity,
    Income,
    Residency,
    Household,
    Other,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::Identity,
        DocumentKind::Income,
        DocumentKind::Residency,
        DocumentKind::Household,
        DocumentKind::Other,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Income => "income",
            Self::Residency => "residency",
            Self::Household => "household",
            Self::Other => "other",
        }
    }

    /// Parse a wire name.
    pub fn parse(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == value)
            .ok_or_else(|| {
                EligoError::Validation(ValidationErrors::single("kind", "unknown document kind"))
            })
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content types accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Pdf,
    Png,
    Jpeg,
}

impl ContentType {
    /// MIME type string.
    #[must_use]
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// File extension used for stored files.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// Parse a declared MIME type. Parameters after `;` are ignored.
    #[must_use]
    pub fn from_mime(value: &str) -> Option<Self> {
        let base = value.split(';').next().unwrap_or_default().trim();
        match base.to_ascii_lowercase().as_str() {
            "application/pdf" => Some(Self::Pdf),
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            _ => None,
        }
    }
}

/// Detect the content type from magic bytes.
#[must_use]
pub fn sniff_content_type(bytes: &[u8]) -> Option<ContentType> {
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    if bytes.starts_with(b"%PDF-") {
        Some(ContentType::Pdf)
    } else if bytes.starts_with(PNG) {
        Some(ContentType::Png)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ContentType::Jpeg)
    } else {
        None
    }
}

/// Reduce a client-supplied file name to a safe basename.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    let capped: String = trimmed.chars().take(MAX_FILE_NAME_LEN).collect();
    if capped.is_empty() || capped.chars().all(|c| c == '_') {
        "document".to_string()
    } else {
        capped
    }
}

/// Check an upload and return its accepted content type.
pub fn validate_upload(declared: Option<&str>, bytes: &[u8], max_bytes: u64) -> Result<ContentType> {
    let mut errors = ValidationErrors::new();
    if bytes.is_empty() {
        errors.add("file", "is empty");
        return Err(EligoError::Validation(errors));
    }
    if bytes.len() as u64 > max_bytes {
        errors.add("file", format!("exceeds the {max_bytes} byte limit"));
        return Err(EligoError::Validation(errors));
    }
    let Some(sniffed) = sniff_content_type(bytes) else {
        errors.add("file", "must be a PDF, PNG or JPEG file");
        return Err(EligoError::Validation(errors));
    };
    match declared.map(|d| (d, ContentType::from_mime(d))) {
        Some((_, Some(ct))) if ct == sniffed => {}
        Some((_, Some(_))) => errors.add("file", "declared content type does not match the file"),
        Some((d, None)) => errors.add("file", format!("unsupported content type {d}")),
        None => errors.add("file", "content type is required"),
    }
    errors.into_result().map(|()| sniffed)
}

/// Metadata of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: DocumentId,
    pub kind: DocumentKind,
    /// Sanitized client file name.
    pub original_name: String,
    /// File name under the application's upload directory.
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the content.
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentMeta {
    /// Build metadata for accepted content.
    #[must_use]
    pub fn new(
        id: DocumentId,
        kind: DocumentKind,
        client_name: &str,
        content_type: ContentType,
        bytes: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            original_name: sanitize_file_name(client_name),
            stored_name: format!("{}.{}", id.0, content_type.extension()),
            content_type: content_type.mime().to_string(),
            size_bytes: bytes.len() as u64,
            sha256: sha256_hex(bytes),
            uploaded_at,
        }
    }
}

/// Lowercase hex SHA-256.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.7\n%fake";
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn sniffing() {
        assert_eq!(sniff_content_type(PDF), Some(ContentType::Pdf));
        assert_eq!(sniff_content_type(PNG), Some(ContentType::Png));
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ContentType::Jpeg));
        assert_eq!(sniff_content_type(b"MZ\x90\x00"), None);
    }

    #[test]
    fn upload_accepts_matching_type() {
        assert_eq!(validate_upload(Some("application/pdf"), PDF, 1024).ok(), Some(ContentType::Pdf));
        assert_eq!(validate_upload(Some("image/png"), PNG, 1024).ok(), Some(ContentType::Png));
    }

    #[test]
    fn upload_requires_declared_type() {
        let result = validate_upload(None, PNG, 1024);
        assert!(matches!(result, Err(EligoError::Validation(ref e)) if e.has_field("file")));
    }

    #[test]
    fn upload_rejects_bad_input() {
        assert!(validate_upload(Some("application/pdf"), b"", 1024).is_err());
        assert!(validate_upload(Some("application/pdf"), PDF, 4).is_err());
        assert!(validate_upload(Some("image/png"), PDF, 1024).is_err());
        assert!(validate_upload(Some("text/html"), PDF, 1024).is_err());
        assert!(validate_upload(Some("application/pdf"), b"<html>", 1024).is_err());
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("pay stub.pdf"), "pay_stub.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\id.png"), "id.png");
        assert_eq!(sanitize_file_name("..hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "document");
        assert_eq!(sanitize_file_name("???"), "document");
        assert_eq!(sanitize_file_name(&"a".repeat(300)).len(), MAX_FILE_NAME_LEN);
    }

    #[test]
    fn meta_names_stored_file_by_id() {
        let meta = DocumentMeta::new(
            DocumentId(3),
            DocumentKind::Income,
            "stub.PDF",
            ContentType::Pdf,
            PDF,
            Utc::now(),
        );
        assert_eq!(meta.stored_name, "3.pdf");
        assert_eq!(meta.size_bytes, PDF.len() as u64);
        assert_eq!(meta.sha256.len(), 64);
    }

    #[test]
    fn kind_parsing() {
        assert_eq!(DocumentKind::parse("income").ok(), Some(DocumentKind::Income));
        assert!(DocumentKind::parse("passport").is_err());
    }
}
