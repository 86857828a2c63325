//! Configuration types for receipt verification.
//!
//! All verification behaviour is controlled through [`VerifierConfig`], built
//! via its [`VerifierConfigBuilder`]. The builder clamps numeric knobs into
//! their valid range and `build()` rejects combinations that cannot work.

use crate::error::PaygateError;
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::metadata::MetadataReader;
use crate::progress::ProgressCallback;
use crate::rules::AcceptanceRules;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a [`crate::verify::PaymentVerifier`].
///
/// # Example
/// ```rust
/// use paygate::{AcceptanceRules, VerifierConfig};
///
/// let config = VerifierConfig::builder()
///     .dpi(300)
///     .language("rus")
///     .rules(AcceptanceRules::new("Kaspi.kz", ["860 T", "Квитанция"]))
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 300);
/// ```
#[derive(Clone)]
pub struct VerifierConfig {
    /// Rendering DPI for each PDF page. Range: 72–600. Default: 300.
    ///
    /// Tesseract is tuned for roughly 300 DPI input; receipts printed in small
    /// fonts lose digits below ~200.
    pub dpi: u32,

    /// Cap on either rendered dimension in pixels. Default: 4000.
    pub max_rendered_pixels: u32,

    /// Tesseract language code(s), e.g. `rus`, `rus+eng`. Default: `rus`.
    pub language: String,

    /// OCR executable. Default: `tesseract` (resolved on `PATH`).
    pub tesseract_program: String,

    /// Tesseract page segmentation mode (`--psm`). Default: engine default.
    pub page_segmentation: Option<u8>,

    /// Directory holding the pdfium shared library. If None, binds to the
    /// system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Upper bound on extraction + metadata reading per submission. Default: 120.
    pub timeout_secs: u64,

    /// Minimum delay between a rejected submission and the next attempt by
    /// the same user. Default: None (no throttling).
    pub resubmit_cooldown_secs: Option<u64>,

    /// Issuer and markers a receipt must carry.
    pub rules: AcceptanceRules,

    /// Pre-constructed text extractor. Takes precedence over the built-in
    /// pdfium + tesseract extractor.
    pub extractor: Option<Arc<dyn TextExtractor>>,

    /// Pre-constructed metadata reader. Takes precedence over pdfium.
    pub metadata_reader: Option<Arc<dyn MetadataReader>>,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 4000,
            language: "rus".to_string(),
            tesseract_program: "tesseract".to_string(),
            page_segmentation: None,
            pdfium_lib_path: None,
            timeout_secs: 120,
            resubmit_cooldown_secs: None,
            rules: AcceptanceRules::default(),
            extractor: None,
            metadata_reader: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("language", &self.language)
            .field("tesseract_program", &self.tesseract_program)
            .field("page_segmentation", &self.page_segmentation)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("timeout_secs", &self.timeout_secs)
            .field("resubmit_cooldown_secs", &self.resubmit_cooldown_secs)
            .field("rules", &self.rules)
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn TextExtractor>"))
            .field(
                "metadata_reader",
                &self.metadata_reader.as_ref().map(|_| "<dyn MetadataReader>"),
            )
            .finish()
    }
}

impl VerifierConfig {
    /// Create a new builder for `VerifierConfig`.
    pub fn builder() -> VerifierConfigBuilder {
        VerifierConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`VerifierConfig`].
#[derive(Debug)]
pub struct VerifierConfigBuilder {
    config: VerifierConfig,
}

impl VerifierConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn tesseract_program(mut self, program: impl Into<String>) -> Self {
        self.config.tesseract_program = program.into();
        self
    }

    pub fn page_segmentation(mut self, psm: u8) -> Self {
        self.config.page_segmentation = Some(psm);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn resubmit_cooldown_secs(mut self, secs: u64) -> Self {
        self.config.resubmit_cooldown_secs = Some(secs);
        self
    }

    pub fn rules(mut self, rules: AcceptanceRules) -> Self {
        self.config.rules = rules;
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn metadata_reader(mut self, reader: Arc<dyn MetadataReader>) -> Self {
        self.config.metadata_reader = Some(reader);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<VerifierConfig, PaygateError> {
        let c = &self.config;
        if c.timeout_secs == 0 {
            return Err(PaygateError::InvalidConfig(
                "Timeout must be at least 1 second".into(),
            ));
        }
        if c.language.trim().is_empty() {
            return Err(PaygateError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.page_segmentation.is_some_and(|psm| psm > 13) {
            return Err(PaygateError::InvalidConfig(format!(
                "Page segmentation mode must be 0–13, got {}",
                c.page_segmentation.unwrap_or_default()
            )));
        }
        c.rules.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let c = VerifierConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.language, "rus");
        assert_eq!(c.rules.issuer, "Kaspi.kz");
        assert!(c.resubmit_cooldown_secs.is_none());
    }

    #[test]
    fn dpi_is_clamped() {
        let c = VerifierConfig::builder().dpi(2000).build().unwrap();
        assert_eq!(c.dpi, 600);
        let c = VerifierConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = VerifierConfig::builder().timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, PaygateError::InvalidConfig(_)));
    }

    #[test]
    fn empty_markers_are_rejected() {
        let rules = AcceptanceRules::new("Kaspi.kz", Vec::<String>::new());
        let err = VerifierConfig::builder().rules(rules).build().unwrap_err();
        assert!(err.to_string().contains("marker"), "got: {err}");
    }

    #[test]
    fn bad_psm_is_rejected() {
        let err = VerifierConfig::builder()
            .page_segmentation(20)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("20"));
    }
}
