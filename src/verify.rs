//! The verification pipeline: one submitted document in, one report out.
//!
//! ```text
//! ledger.has_record ──yes──▶ AlreadyPaid (no verification)
//!        │ no
//! cooldown check ──throttled──▶ Throttled
//!        │
//! intake::stage ──wrong type / unreadable──▶ ResubmitRequested
//!        │
//!   ┌────┴─────┐   (concurrent, blocking pool, bounded by timeout)
//! extract   metadata
//!   └────┬─────┘
//! rules::verify ──rejected──▶ Rejected(reason)
//!        │ accepted
//! ledger.try_record ──Inserted | AlreadyExists──▶ Accepted
//! ```
//!
//! The staged temp file is shared by both blocking tasks and removed when the
//! last of them finishes, on every path.

use crate::config::VerifierConfig;
use crate::error::PaygateError;
use crate::ledger::{Ledger, RecordOutcome};
use crate::output::{
    AcceptanceVerdict, DocumentMetadata, ExtractedContent, PaymentRecord, RejectionReason,
    UserId,
};
use crate::pipeline::extract::{OcrTextExtractor, TextExtractor};
use crate::pipeline::intake::{self, Document};
use crate::pipeline::metadata::{MetadataReader, PdfiumMetadataReader};
use crate::rules;
use crate::state::{SubmissionEvent, SubmissionState, SubmissionTracker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What happened to one submission, from the user's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// The ledger already proves payment; nothing was verified.
    AlreadyPaid,
    /// Receipt accepted. `inserted` is false when a concurrent submission
    /// recorded the payment first.
    Accepted { inserted: bool },
    /// Receipt read but turned down.
    Rejected { reason: RejectionReason },
    /// File could not be read; the user should send it again.
    ResubmitRequested { reason: String },
    /// Too soon after the last rejection.
    Throttled { retry_after_secs: u64 },
}

/// Result handed back to the messaging layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub user: UserId,
    pub outcome: SubmissionOutcome,
    /// Rule-engine verdict, when the document got that far.
    pub verdict: Option<AcceptanceVerdict>,
    pub state: SubmissionState,
    pub record: Option<PaymentRecord>,
    pub duration_ms: u64,
}

/// Verifies receipts and records accepted payments exactly once per user.
pub struct PaymentVerifier {
    config: VerifierConfig,
    ledger: Arc<dyn Ledger>,
    tracker: SubmissionTracker,
    extractor: Arc<dyn TextExtractor>,
    metadata_reader: Arc<dyn MetadataReader>,
}

impl PaymentVerifier {
    /// Build a verifier. Extractor and metadata reader come from `config`
    /// when set, otherwise pdfium + tesseract are used.
    pub fn new(config: VerifierConfig, ledger: Arc<dyn Ledger>) -> Self {
        let extractor = config
            .extractor
            .clone()
            .unwrap_or_else(|| Arc::new(OcrTextExtractor::from_config(&config)));
        let metadata_reader = config
            .metadata_reader
            .clone()
            .unwrap_or_else(|| Arc::new(PdfiumMetadataReader::from_config(&config)));
        let tracker = SubmissionTracker::new(config.resubmit_cooldown_secs.map(Duration::from_secs));

        Self {
            config,
            ledger,
            tracker,
            extractor,
            metadata_reader,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Whether the ledger holds a payment for `user`.
    pub async fn has_paid(&self, user: &UserId) -> Result<bool, PaygateError> {
        let ledger = Arc::clone(&self.ledger);
        let user = user.clone();
        Ok(blocking(move || ledger.has_record(&user)).await??)
    }

    /// The user opened the payment flow.
    pub async fn start(&self, user: &UserId) -> Result<SubmissionState, PaygateError> {
        let paid = self.has_paid(user).await?;
        let state = self.tracker.apply(user, &SubmissionEvent::Start, paid);
        debug!(user = %user, ?state, "Flow started");
        Ok(state)
    }

    /// Current state, with the ledger taking precedence over the tracker.
    pub async fn status(&self, user: &UserId) -> Result<SubmissionState, PaygateError> {
        if self.has_paid(user).await? {
            return Ok(SubmissionState::Resolved);
        }
        Ok(self.tracker.state(user))
    }

    /// Verify a submitted document for `user` and record it if accepted.
    ///
    /// Document problems come back as `Ok` with
    /// [`SubmissionOutcome::ResubmitRequested`]; only environment and
    /// storage failures are `Err`.
    pub async fn submit(
        &self,
        user: &UserId,
        document: Document,
    ) -> Result<SubmissionReport, PaygateError> {
        let started = Instant::now();
        info!(user = %user, file = %document.filename, "Submission received");

        // ── Short-circuit on an existing record ──────────────────────────
        if self.has_paid(user).await? {
            let state = self.tracker.apply(user, &SubmissionEvent::Start, true);
            let record = self.fetch_record(user).await?;
            info!(user = %user, "Already paid; skipping verification");
            return Ok(self.report(
                user,
                SubmissionOutcome::AlreadyPaid,
                None,
                state,
                record,
                started,
            ));
        }

        // ── Throttle resubmissions ───────────────────────────────────────
        if let Some(left) = self.tracker.cooldown_remaining(user) {
            let retry_after_secs = left.as_secs().max(1);
            info!(user = %user, retry_after_secs, "Submission throttled");
            let state = self.tracker.state(user);
            return Ok(self.report(
                user,
                SubmissionOutcome::Throttled { retry_after_secs },
                None,
                state,
                None,
                started,
            ));
        }

        // ── Stage, extract, read metadata ────────────────────────────────
        let inspected = match self.inspect(&document).await {
            Ok(inspected) => inspected,
            Err(e) if e.is_resubmittable() => {
                let event = match e {
                    PaygateError::WrongFileType { .. } => SubmissionEvent::WrongFileType,
                    _ => SubmissionEvent::ExtractionFailed,
                };
                warn!(user = %user, error = %e, "Document unreadable; asking for resubmission");
                // A concurrent submission may have recorded a payment meanwhile.
                let paid = self.has_paid(user).await?;
                let state = self.tracker.apply(user, &event, paid);
                return Ok(self.report(
                    user,
                    SubmissionOutcome::ResubmitRequested {
                        reason: e.to_string(),
                    },
                    None,
                    state,
                    None,
                    started,
                ));
            }
            Err(e) => return Err(e),
        };

        // ── Decide ───────────────────────────────────────────────────────
        let verdict = match &inspected.metadata {
            Some(metadata) => rules::verify(&self.config.rules, &inspected.content, metadata),
            None => AcceptanceVerdict::Rejected(RejectionReason::MissingMetadata),
        };
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_verdict(&verdict);
        }

        let reason = match &verdict {
            AcceptanceVerdict::Accepted => None,
            AcceptanceVerdict::Rejected(reason) => Some(reason.clone()),
        };
        if let Some(reason) = reason {
            info!(user = %user, %reason, "Receipt rejected");
            let paid = self.has_paid(user).await?;
            let state = self.tracker.apply(user, &SubmissionEvent::Rejected, paid);
            return Ok(self.report(
                user,
                SubmissionOutcome::Rejected { reason },
                Some(verdict),
                state,
                None,
                started,
            ));
        }

        // ── Record ───────────────────────────────────────────────────────
        let ledger = Arc::clone(&self.ledger);
        let who = user.clone();
        let recorded = blocking(move || ledger.try_record(&who)).await??;
        match recorded {
            RecordOutcome::Inserted => info!(user = %user, "Payment recorded"),
            RecordOutcome::AlreadyExists => {
                info!(user = %user, "Payment already recorded by a concurrent submission")
            }
        }
        let state = self
            .tracker
            .apply(user, &SubmissionEvent::Recorded(recorded), true);
        let record = self.fetch_record(user).await?;

        Ok(self.report(
            user,
            SubmissionOutcome::Accepted {
                inserted: recorded == RecordOutcome::Inserted,
            },
            Some(verdict),
            state,
            record,
            started,
        ))
    }

    /// Stage the document and run extraction and metadata reading side by
    /// side on the blocking pool.
    async fn inspect(&self, document: &Document) -> Result<Inspected, PaygateError> {
        let staged = Arc::new(intake::stage(document)?);

        let extract = {
            let staged = Arc::clone(&staged);
            let extractor = Arc::clone(&self.extractor);
            let progress = self.config.progress_callback.clone();
            blocking(move || extractor.extract(&staged, progress.as_deref()))
        };
        let metadata = {
            let staged = Arc::clone(&staged);
            let reader = Arc::clone(&self.metadata_reader);
            blocking(move || reader.read(&staged))
        };
        drop(staged);

        let secs = self.config.timeout_secs;
        let (content, metadata) = tokio::time::timeout(Duration::from_secs(secs), async {
            tokio::join!(extract, metadata)
        })
        .await
        .map_err(|_| PaygateError::TimedOut { secs })?;

        let content = content??;
        let metadata = match metadata? {
            Ok(metadata) => Some(metadata),
            Err(PaygateError::MissingMetadata { filename }) => {
                debug!("{}: no producer metadata", filename);
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Inspected { content, metadata })
    }

    async fn fetch_record(&self, user: &UserId) -> Result<Option<PaymentRecord>, PaygateError> {
        let ledger = Arc::clone(&self.ledger);
        let user = user.clone();
        Ok(blocking(move || ledger.get(&user)).await??)
    }

    fn report(
        &self,
        user: &UserId,
        outcome: SubmissionOutcome,
        verdict: Option<AcceptanceVerdict>,
        state: SubmissionState,
        record: Option<PaymentRecord>,
        started: Instant,
    ) -> SubmissionReport {
        SubmissionReport {
            user: user.clone(),
            outcome,
            verdict,
            state,
            record,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

struct Inspected {
    content: ExtractedContent,
    metadata: Option<DocumentMetadata>,
}

/// Read container metadata only. No OCR, no ledger.
pub async fn inspect_document(
    document: &Document,
    config: &VerifierConfig,
) -> Result<DocumentMetadata, PaygateError> {
    let staged = intake::stage(document)?;
    let reader = config
        .metadata_reader
        .clone()
        .unwrap_or_else(|| Arc::new(PdfiumMetadataReader::from_config(config)));
    blocking(move || reader.read(&staged)).await?
}

/// Run text extraction only. Useful for tuning markers against real receipts.
pub async fn extract_document(
    document: &Document,
    config: &VerifierConfig,
) -> Result<ExtractedContent, PaygateError> {
    let staged = intake::stage(document)?;
    let extractor = config
        .extractor
        .clone()
        .unwrap_or_else(|| Arc::new(OcrTextExtractor::from_config(config)));
    let progress = config.progress_callback.clone();
    let secs = config.timeout_secs;
    tokio::time::timeout(
        Duration::from_secs(secs),
        blocking(move || extractor.extract(&staged, progress.as_deref())),
    )
    .await
    .map_err(|_| PaygateError::TimedOut { secs })??
}

/// Run blocking work on tokio's blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, PaygateError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PaygateError::Internal(format!("Blocking task panicked: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::output::PageText;
    use crate::pipeline::intake::StagedDocument;
    use crate::progress::VerificationProgressCallback;

    struct FixedText(&'static str);

    impl TextExtractor for FixedText {
        fn extract(
            &self,
            _document: &StagedDocument,
            _progress: Option<&dyn VerificationProgressCallback>,
        ) -> Result<ExtractedContent, PaygateError> {
            Ok(ExtractedContent::from_pages(vec![PageText {
                page_num: 1,
                text: self.0.to_string(),
            }]))
        }
    }

    struct FixedProducer(&'static str);

    impl MetadataReader for FixedProducer {
        fn read(&self, _document: &StagedDocument) -> Result<DocumentMetadata, PaygateError> {
            Ok(DocumentMetadata {
                producer: self.0.to_string(),
                page_count: 1,
                ..Default::default()
            })
        }
    }

    fn verifier(text: &'static str, producer: &'static str) -> PaymentVerifier {
        let config = VerifierConfig::builder()
            .extractor(Arc::new(FixedText(text)))
            .metadata_reader(Arc::new(FixedProducer(producer)))
            .build()
            .unwrap();
        PaymentVerifier::new(config, Arc::new(InMemoryLedger::new()))
    }

    fn pdf() -> Document {
        Document::new(b"%PDF-1.4\n".to_vec(), "application/pdf", "receipt.pdf")
    }

    #[test]
    fn accepted_receipt_resolves_user() {
        let v = verifier("Квитанция\nСумма 860 T", "Kaspi.kz");
        let user = UserId::from(5i64);
        let report = tokio_test::block_on(v.submit(&user, pdf())).unwrap();
        assert_eq!(report.outcome, SubmissionOutcome::Accepted { inserted: true });
        assert_eq!(report.state, SubmissionState::Resolved);
        assert!(report.record.is_some());
    }

    #[tokio::test]
    async fn wrong_file_type_requests_resubmission() {
        let v = verifier("Квитанция 860 T", "Kaspi.kz");
        let user = UserId::from(6i64);
        v.start(&user).await.unwrap();
        let doc = Document::new(b"hi".to_vec(), "text/plain", "hi.txt");
        let report = v.submit(&user, doc).await.unwrap();
        assert!(matches!(
            report.outcome,
            SubmissionOutcome::ResubmitRequested { .. }
        ));
        assert_eq!(report.state, SubmissionState::AwaitingDocument);
        assert!(report.verdict.is_none());
    }
}
