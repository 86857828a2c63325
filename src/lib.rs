//! # paygate
//!
//! Verify a proof-of-payment receipt and record the payment exactly once.
//!
//! A user who wants access sends a receipt (a bank-app PDF export or a
//! photo). This crate reads it with OCR, checks it against a fixed set of
//! acceptance rules, and writes at most one payment record per user even
//! when the same user submits several times at once.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Document (bytes + MIME + filename)
//!  │
//!  ├─ 0. Ledger    already paid? → done, no verification
//!  ├─ 1. Intake    classify, check magic bytes, stage to a temp file
//!  ├─ 2. Extract   render pages at 300 DPI (pdfium) → OCR (tesseract)   ┐ concurrent,
//!  ├─ 3. Metadata  read the producer field, no rendering                ┘ blocking pool
//!  ├─ 4. Rules     issuer == producer, every marker present in the text
//!  ├─ 5. Ledger    try_record(user) → Inserted | AlreadyExists (both = paid)
//!  └─ 6. State     Unpaid → AwaitingDocument → Resolved
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paygate::{Document, PaymentVerifier, SqliteLedger, UserId, VerifierConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = Arc::new(SqliteLedger::open("payments.db")?);
//!     let verifier = PaymentVerifier::new(VerifierConfig::default(), ledger);
//!
//!     let user = UserId::from(716_407_545i64);
//!     verifier.start(&user).await?;
//!
//!     let bytes = std::fs::read("transfer-receipt.pdf")?;
//!     let doc = Document::new(bytes, "application/pdf", "transfer-receipt.pdf");
//!     let report = verifier.submit(&user, doc).await?;
//!     println!("{:?} → {:?}", report.outcome, report.state);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paygate` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## Runtime requirements
//!
//! - `libpdfium` on the library path, or `VerifierConfig::pdfium_lib_path`
//! - `tesseract` with the configured language pack (`rus` by default)

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod ledger;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod rules;
pub mod state;
pub mod verify;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{VerifierConfig, VerifierConfigBuilder};
pub use error::{LedgerError, PaygateError};
pub use ledger::{InMemoryLedger, Ledger, RecordOutcome, SqliteLedger};
pub use output::{
    AcceptanceVerdict, DocumentMetadata, ExtractedContent, PageText, PaymentRecord,
    RejectionReason, UserId,
};
pub use pipeline::extract::{OcrTextExtractor, TextExtractor};
pub use pipeline::intake::{Document, DocumentKind, StagedDocument};
pub use pipeline::metadata::{MetadataReader, PdfiumMetadataReader};
pub use pipeline::ocr::{OcrEngine, TesseractCli};
pub use progress::{NoopProgressCallback, ProgressCallback, VerificationProgressCallback};
pub use rules::{verify, AcceptanceRules};
pub use state::{transition, SubmissionEvent, SubmissionState, SubmissionTracker};
pub use verify::{
    extract_document, inspect_document, PaymentVerifier, SubmissionOutcome, SubmissionReport,
};
