//! Error types for the paygate library.
//!
//! Two error types reflect two different owners of a failure:
//!
//! * [`PaygateError`]: a single submission could not be verified at all
//!   (unreadable file, page that would not rasterise, OCR engine missing).
//!   Every variant is scoped to one submission; none is fatal to the process.
//!
//! * [`LedgerError`]: the payment store itself failed (I/O, locked database).
//!   A uniqueness conflict is **not** an error: it is reported as
//!   [`crate::ledger::RecordOutcome::AlreadyExists`].
//!
//! A rule-engine rejection is not an error either; it is a normal
//! [`crate::output::AcceptanceVerdict::Rejected`] value.

use thiserror::Error;

/// All per-submission errors returned by the paygate library.
#[derive(Debug, Error)]
pub enum PaygateError {
    // ── Document errors ───────────────────────────────────────────────────
    /// Declared MIME type / filename is not a receipt format we read.
    #[error("Unsupported file type '{mime_type}' ({filename})\nSend the receipt as a PDF or an image.")]
    WrongFileType { mime_type: String, filename: String },

    /// The bytes cannot be parsed as the declared format.
    #[error("Document '{filename}' cannot be read as {expected}: {detail}")]
    UnsupportedDocument {
        filename: String,
        expected: String,
        detail: String,
    },

    /// A specific page could not be rasterised.
    #[error("Rendering failed for page {page}: {detail}")]
    RenderFailure { page: usize, detail: String },

    /// OCR engine ran but failed on a page.
    #[error("Text recognition failed for page {page}: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// The container has no producer field.
    #[error("Document '{filename}' carries no producer metadata")]
    MissingMetadata { filename: String },

    /// Extraction did not finish within the submission timeout.
    #[error("Verification timed out after {secs}s")]
    TimedOut { secs: u64 },

    // ── Environment errors ────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PAYGATE_PDFIUM_LIB_PATH to the directory containing libpdfium."
    )]
    PdfiumBindingFailed(String),

    /// The OCR binary could not be started.
    #[error("Cannot run OCR engine '{program}': {detail}\nInstall tesseract with the required language pack.")]
    OcrUnavailable { program: String, detail: String },

    // ── Storage errors ────────────────────────────────────────────────────
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaygateError {
    /// Whether the user should simply be asked to send the document again.
    ///
    /// Document-level failures are; environment, storage and config failures
    /// are operator problems and a resubmission will not help.
    pub fn is_resubmittable(&self) -> bool {
        matches!(
            self,
            PaygateError::WrongFileType { .. }
                | PaygateError::UnsupportedDocument { .. }
                | PaygateError::RenderFailure { .. }
                | PaygateError::OcrFailed { .. }
                | PaygateError::MissingMetadata { .. }
                | PaygateError::TimedOut { .. }
        )
    }
}

/// Failures of the payment store.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot open ledger at '{path}': {source}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt ledger row for user '{user}': {detail}")]
    CorruptRow { user: String, detail: String },

    #[error("Ledger lock poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_file_type_display() {
        let e = PaygateError::WrongFileType {
            mime_type: "text/plain".into(),
            filename: "notes.txt".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("text/plain"), "got: {msg}");
        assert!(msg.contains("notes.txt"), "got: {msg}");
    }

    #[test]
    fn render_failure_display() {
        let e = PaygateError::RenderFailure {
            page: 2,
            detail: "bitmap allocation".into(),
        };
        assert!(e.to_string().contains("page 2"));
    }

    #[test]
    fn timed_out_display() {
        let e = PaygateError::TimedOut { secs: 90 };
        assert!(e.to_string().contains("90s"));
    }

    #[test]
    fn document_errors_are_resubmittable() {
        assert!(PaygateError::TimedOut { secs: 1 }.is_resubmittable());
        assert!(PaygateError::UnsupportedDocument {
            filename: "a.pdf".into(),
            expected: "PDF".into(),
            detail: "bad header".into(),
        }
        .is_resubmittable());
        assert!(!PaygateError::PdfiumBindingFailed("missing".into()).is_resubmittable());
        assert!(!PaygateError::Ledger(LedgerError::Poisoned).is_resubmittable());
    }
}
