//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn VerificationProgressCallback>`] via
//! [`crate::config::VerifierConfigBuilder::progress_callback`] to receive
//! events while a document is being rendered and recognised. OCR at 300 DPI
//! takes seconds per page, so a front-end usually wants to show something.
//!
//! Callbacks fire from the blocking extraction thread. Implementations must be
//! `Send + Sync` and protect their own state.
//!
//! # Example
//!
//! ```rust
//! use paygate::{VerificationProgressCallback, VerifierConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: AtomicUsize,
//! }
//!
//! impl VerificationProgressCallback for CountingCallback {
//!     fn on_page_recognised(&self, _page_num: usize, _total_pages: usize, _chars: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { pages: AtomicUsize::new(0) });
//! let config = VerifierConfig::builder()
//!     .progress_callback(cb as Arc<dyn VerificationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::AcceptanceVerdict;
use std::sync::Arc;

/// Called by the pipeline while it verifies one document.
///
/// All methods default to no-ops.
pub trait VerificationProgressCallback: Send + Sync {
    /// Called once the page count is known, before the first page is rendered.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after OCR finishes for a page.
    ///
    /// * `page_num`: 1-indexed page number
    /// * `chars`   : number of characters recognised on the page
    fn on_page_recognised(&self, page_num: usize, total_pages: usize, chars: usize) {
        let _ = (page_num, total_pages, chars);
    }

    /// Called once the rule engine has decided.
    fn on_verdict(&self, verdict: &AcceptanceVerdict) {
        let _ = verdict;
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl VerificationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::VerifierConfig`].
pub type ProgressCallback = Arc<dyn VerificationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RejectionReason;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        total: AtomicUsize,
        pages: AtomicUsize,
        chars: AtomicUsize,
        verdicts: AtomicUsize,
    }

    impl VerificationProgressCallback for TrackingCallback {
        fn on_extraction_start(&self, total_pages: usize) {
            self.total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_recognised(&self, _page_num: usize, _total_pages: usize, chars: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
            self.chars.fetch_add(chars, Ordering::SeqCst);
        }

        fn on_verdict(&self, _verdict: &AcceptanceVerdict) {
            self.verdicts.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(2);
        cb.on_page_recognised(1, 2, 120);
        cb.on_verdict(&AcceptanceVerdict::Accepted);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_extraction_start(2);
        tracker.on_page_recognised(1, 2, 100);
        tracker.on_page_recognised(2, 2, 50);
        tracker.on_verdict(&AcceptanceVerdict::Rejected(
            RejectionReason::MissingMetadata,
        ));

        assert_eq!(tracker.total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.chars.load(Ordering::SeqCst), 150);
        assert_eq!(tracker.verdicts.load(Ordering::SeqCst), 1);
    }
}
