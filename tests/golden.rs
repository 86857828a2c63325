//! End-to-end tests against real receipts with pdfium and tesseract.
//!
//! These tests read files from `./test_cases/` and need `libpdfium` plus a
//! `tesseract` install with the `rus` language pack. They are gated behind
//! the `E2E_ENABLED` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PAYGATE_PDFIUM_LIB_PATH=. cargo test --test golden -- --nocapture
//!
//! Expected files:
//!   test_cases/kaspi_receipt.pdf   a genuine 860 T transfer receipt
//!   test_cases/other_bank.pdf      a receipt exported by another app
//!   test_cases/kaspi_photo.jpg     a photo of a Kaspi receipt

use paygate::{
    extract_document, inspect_document, AcceptanceVerdict, Document, InMemoryLedger,
    PaymentVerifier, RejectionReason, SubmissionOutcome, UserId, VerifierConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn e2e_config() -> VerifierConfig {
    let mut builder = VerifierConfig::builder();
    if let Ok(dir) = std::env::var("PAYGATE_PDFIUM_LIB_PATH") {
        builder = builder.pdfium_lib_path(dir);
    }
    builder.build().unwrap()
}

fn load(path: &Path) -> Document {
    Document::from_path(path).unwrap()
}

// ── Metadata ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_kaspi_receipt() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("kaspi_receipt.pdf"));

    let meta = inspect_document(&load(&path), &e2e_config()).await.unwrap();
    println!("Producer: {:?}", meta.producer);
    println!("Pages:    {}", meta.page_count);

    assert!(meta.page_count >= 1);
    assert!(
        meta.producer.to_lowercase().contains("kaspi"),
        "Unexpected producer: {}",
        meta.producer
    );
}

#[tokio::test]
async fn test_inspect_photo_has_no_metadata() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("kaspi_photo.jpg"));

    let err = inspect_document(&load(&path), &e2e_config())
        .await
        .unwrap_err();
    assert!(err.is_resubmittable(), "got: {err}");
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_kaspi_receipt_finds_markers() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("kaspi_receipt.pdf"));

    let config = e2e_config();
    let content = extract_document(&load(&path), &config).await.unwrap();
    println!("{}", content.text());

    assert!(content.page_count() >= 1);
    assert!(content.text().starts_with("----- Page 1 -----\n"));
    for marker in &config.rules.required_markers {
        assert!(content.contains(marker), "Marker {marker:?} not recognised");
    }
}

#[tokio::test]
async fn test_extract_photo() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("kaspi_photo.jpg"));

    let content = extract_document(&load(&path), &e2e_config())
        .await
        .unwrap();
    assert_eq!(content.page_count(), 1);
    assert!(!content.text().trim().is_empty());
}

// ── Full verification ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_verify_kaspi_receipt_accepted() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("kaspi_receipt.pdf"));

    let ledger = Arc::new(InMemoryLedger::new());
    let v = PaymentVerifier::new(e2e_config(), ledger.clone());
    let user = UserId::from(716_407_545i64);

    let report = v.submit(&user, load(&path)).await.unwrap();
    println!("{}", serde_json::to_string_pretty(&report).unwrap());

    assert_eq!(report.verdict, Some(AcceptanceVerdict::Accepted));
    assert_eq!(report.outcome, SubmissionOutcome::Accepted { inserted: true });
    assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn test_verify_other_bank_rejected() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("other_bank.pdf"));

    let ledger = Arc::new(InMemoryLedger::new());
    let v = PaymentVerifier::new(e2e_config(), ledger.clone());

    let report = v.submit(&UserId::from(1i64), load(&path)).await.unwrap();
    println!("{:?}", report.outcome);

    assert!(matches!(
        report.outcome,
        SubmissionOutcome::Rejected {
            reason: RejectionReason::IssuerMismatch { .. } | RejectionReason::MissingMetadata
        }
    ));
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn test_verify_photo_rejected_for_missing_metadata() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("kaspi_photo.jpg"));

    let v = PaymentVerifier::new(e2e_config(), Arc::new(InMemoryLedger::new()));
    let report = v.submit(&UserId::from(2i64), load(&path)).await.unwrap();

    assert_eq!(
        report.outcome,
        SubmissionOutcome::Rejected {
            reason: RejectionReason::MissingMetadata
        }
    );
}
