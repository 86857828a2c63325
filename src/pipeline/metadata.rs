//! Metadata reading: producer and related fields from the file container.
//!
//! Reads the PDF information dictionary only; no page is rendered. Image
//! receipts have no such dictionary and always come back as
//! [`PaygateError::MissingMetadata`], which the verifier turns into a
//! rejection rather than a failure.

use crate::config::VerifierConfig;
use crate::error::PaygateError;
use crate::output::DocumentMetadata;
use crate::pipeline::intake::{DocumentKind, StagedDocument};
use crate::pipeline::render::{self, RawMetadata};
use std::path::PathBuf;
use tracing::debug;

/// Read container metadata from a staged document. Blocking.
pub trait MetadataReader: Send + Sync {
    fn read(&self, document: &StagedDocument) -> Result<DocumentMetadata, PaygateError>;
}

/// Reads the PDF information dictionary through pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumMetadataReader {
    pdfium_lib_path: Option<PathBuf>,
}

impl PdfiumMetadataReader {
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self {
            pdfium_lib_path: config.pdfium_lib_path.clone(),
        }
    }
}

impl MetadataReader for PdfiumMetadataReader {
    fn read(&self, document: &StagedDocument) -> Result<DocumentMetadata, PaygateError> {
        if let DocumentKind::Image(_) = document.kind() {
            return Err(PaygateError::MissingMetadata {
                filename: document.filename().to_string(),
            });
        }

        let pdfium = render::shared_pdfium(self.pdfium_lib_path.as_deref())?;
        let pdf = render::open_document(pdfium, document.path(), document.filename())?;
        let raw = render::read_metadata(&pdf);
        debug!("{}: metadata {:?}", document.filename(), raw);
        into_metadata(raw, document.filename())
    }
}

/// Require the producer field; keep everything else as-is.
pub(crate) fn into_metadata(raw: RawMetadata, filename: &str) -> Result<DocumentMetadata, PaygateError> {
    let producer = raw.producer.ok_or_else(|| PaygateError::MissingMetadata {
        filename: filename.to_string(),
    })?;
    Ok(DocumentMetadata {
        producer,
        creator: raw.creator,
        author: raw.author,
        title: raw.title,
        creation_date: raw.creation_date,
        page_count: raw.page_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::intake::{stage, Document};

    #[test]
    fn producer_is_required() {
        let raw = RawMetadata {
            creator: Some("Kaspi.kz".into()),
            page_count: 1,
            ..Default::default()
        };
        assert!(matches!(
            into_metadata(raw, "receipt.pdf"),
            Err(PaygateError::MissingMetadata { .. })
        ));
    }

    #[test]
    fn fields_are_carried_over() {
        let raw = RawMetadata {
            producer: Some("Kaspi.kz".into()),
            title: Some("transfer-receipt".into()),
            page_count: 1,
            ..Default::default()
        };
        let meta = into_metadata(raw, "receipt.pdf").unwrap();
        assert_eq!(meta.producer, "Kaspi.kz");
        assert_eq!(meta.title.as_deref(), Some("transfer-receipt"));
        assert_eq!(meta.page_count, 1);
    }

    #[test]
    fn images_have_no_metadata() {
        let jpeg_magic = vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0];
        let staged = stage(&Document::new(jpeg_magic, "image/jpeg", "photo.jpg")).unwrap();
        let err = PdfiumMetadataReader::default().read(&staged).unwrap_err();
        assert!(matches!(err, PaygateError::MissingMetadata { .. }));
    }
}
