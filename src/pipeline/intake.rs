//! Document intake: classify a submitted file and stage it on disk.
//!
//! pdfium and tesseract both want a file-system path, so the submitted bytes
//! are written to a [`NamedTempFile`]. The file lives exactly as long as the
//! [`StagedDocument`] that owns it and is deleted when that value is dropped,
//! whichever way the verification attempt ends. Magic bytes are checked
//! before anything else sees the file so a mislabelled upload fails with
//! [`PaygateError::UnsupportedDocument`] instead of a pdfium crash.

use crate::error::PaygateError;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// A submitted file as handed over by the messaging layer.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

impl Document {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        mime_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            filename: filename.into(),
        }
    }

    /// Read a file from disk, guessing the MIME type from its extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        let mime_type = mime_from_extension(&filename).to_string();
        Ok(Self::new(bytes, mime_type, filename))
    }
}

/// Receipt formats the pipeline can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image(image::ImageFormat),
}

impl DocumentKind {
    /// Classify by declared MIME type, falling back to the filename extension
    /// when the MIME type is generic (`application/octet-stream` or empty).
    pub fn classify(mime_type: &str, filename: &str) -> Option<Self> {
        let mime = mime_type.trim().to_lowercase();
        let mime = if mime.is_empty() || mime == "application/octet-stream" {
            mime_from_extension(filename).to_string()
        } else {
            mime
        };

        match mime.as_str() {
            "application/pdf" => Some(DocumentKind::Pdf),
            "image/png" => Some(DocumentKind::Image(image::ImageFormat::Png)),
            "image/jpeg" | "image/jpg" => Some(DocumentKind::Image(image::ImageFormat::Jpeg)),
            "image/tiff" => Some(DocumentKind::Image(image::ImageFormat::Tiff)),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Image(_) => "image",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => ".pdf",
            DocumentKind::Image(image::ImageFormat::Png) => ".png",
            DocumentKind::Image(image::ImageFormat::Tiff) => ".tiff",
            DocumentKind::Image(_) => ".jpg",
        }
    }
}

fn mime_from_extension(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// A validated document written to a scoped temp file.
pub struct StagedDocument {
    kind: DocumentKind,
    filename: String,
    file: NamedTempFile,
}

impl StagedDocument {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Classify, validate and stage a document.
pub fn stage(document: &Document) -> Result<StagedDocument, PaygateError> {
    let kind = DocumentKind::classify(&document.mime_type, &document.filename).ok_or_else(
        || PaygateError::WrongFileType {
            mime_type: document.mime_type.clone(),
            filename: document.filename.clone(),
        },
    )?;

    validate_magic(document, kind)?;

    let mut file = tempfile::Builder::new()
        .prefix("paygate-")
        .suffix(kind.suffix())
        .tempfile()
        .map_err(|e| PaygateError::Internal(format!("tempfile: {e}")))?;
    file.write_all(&document.bytes)
        .and_then(|_| file.flush())
        .map_err(|e| PaygateError::Internal(format!("tempfile write: {e}")))?;

    debug!(
        "Staged {} ({} bytes) at {}",
        document.filename,
        document.bytes.len(),
        file.path().display()
    );

    Ok(StagedDocument {
        kind,
        filename: document.filename.clone(),
        file,
    })
}

fn validate_magic(document: &Document, kind: DocumentKind) -> Result<(), PaygateError> {
    let unsupported = |detail: String| PaygateError::UnsupportedDocument {
        filename: document.filename.clone(),
        expected: kind.label().to_string(),
        detail,
    };

    match kind {
        DocumentKind::Pdf => {
            if document.bytes.len() < 4 || &document.bytes[..4] != b"%PDF" {
                let mut magic = [0u8; 4];
                let n = document.bytes.len().min(4);
                magic[..n].copy_from_slice(&document.bytes[..n]);
                return Err(unsupported(format!("first bytes {:?}", magic)));
            }
        }
        DocumentKind::Image(declared) => {
            let detected = image::guess_format(&document.bytes)
                .map_err(|e| unsupported(e.to_string()))?;
            if detected != declared {
                return Err(unsupported(format!(
                    "declared {:?} but content is {:?}",
                    declared, detected
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn classify_by_mime_and_extension() {
        assert_eq!(
            DocumentKind::classify("application/pdf", "receipt"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::classify("application/octet-stream", "transfer-receipt.PDF"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::classify("image/jpeg", "photo.jpg"),
            Some(DocumentKind::Image(image::ImageFormat::Jpeg))
        );
        assert_eq!(DocumentKind::classify("text/plain", "notes.txt"), None);
        assert_eq!(DocumentKind::classify("", "archive.zip"), None);
    }

    #[test]
    fn wrong_file_type_is_reported() {
        let doc = Document::new(b"hello".to_vec(), "text/plain", "hello.txt");
        assert!(matches!(
            stage(&doc),
            Err(PaygateError::WrongFileType { .. })
        ));
    }

    #[test]
    fn pdf_without_magic_is_unsupported() {
        let doc = Document::new(b"<html>".to_vec(), "application/pdf", "receipt.pdf");
        match stage(&doc) {
            Err(PaygateError::UnsupportedDocument { expected, .. }) => assert_eq!(expected, "PDF"),
            other => panic!("expected UnsupportedDocument, got {:?}", other.err()),
        }
    }

    #[test]
    fn short_pdf_is_unsupported() {
        let doc = Document::new(b"%P".to_vec(), "application/pdf", "receipt.pdf");
        assert!(matches!(
            stage(&doc),
            Err(PaygateError::UnsupportedDocument { .. })
        ));
    }

    #[test]
    fn image_with_mismatched_content_is_unsupported() {
        let doc = Document::new(PNG_MAGIC.to_vec(), "image/jpeg", "photo.jpg");
        assert!(matches!(
            stage(&doc),
            Err(PaygateError::UnsupportedDocument { .. })
        ));
    }

    #[test]
    fn staged_file_is_removed_on_drop() {
        let doc = Document::new(b"%PDF-1.7\n".to_vec(), "application/pdf", "receipt.pdf");
        let staged = stage(&doc).expect("stage");
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7\n");
        assert_eq!(staged.kind(), DocumentKind::Pdf);
        drop(staged);
        assert!(!path.exists());
    }
}
