//! Acceptance rules: decide whether extracted receipt text proves a payment.
//!
//! Matching is plain substring presence. Receipts arrive as exports and
//! photos of very different quality, and substring presence is the signal
//! that survives noisy OCR best. A misread marker produces a false rejection;
//! the user resubmits. The rules are never loosened to compensate.

use crate::error::PaygateError;
use crate::output::{AcceptanceVerdict, DocumentMetadata, ExtractedContent, RejectionReason};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Expected issuer plus the literal markers every valid receipt carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceRules {
    /// Compared against [`DocumentMetadata::producer`], ignoring case and
    /// surrounding whitespace.
    pub issuer: String,
    /// All must occur somewhere in the concatenated text. Checked in order.
    pub required_markers: Vec<String>,
}

impl Default for AcceptanceRules {
    fn default() -> Self {
        Self::new("Kaspi.kz", ["860 T", "Квитанция"])
    }
}

impl AcceptanceRules {
    pub fn new<I, S>(issuer: impl Into<String>, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            issuer: issuer.into(),
            required_markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    /// Load rules from a JSON document such as
    /// `{"issuer": "Kaspi.kz", "required_markers": ["860 T"]}`.
    pub fn from_json(json: &str) -> Result<Self, PaygateError> {
        let rules: Self = serde_json::from_str(json)
            .map_err(|e| PaygateError::InvalidConfig(format!("Acceptance rules: {e}")))?;
        rules.validate()?;
        Ok(rules)
    }

    pub(crate) fn validate(&self) -> Result<(), PaygateError> {
        if self.issuer.trim().is_empty() {
            return Err(PaygateError::InvalidConfig(
                "Expected issuer must not be empty".into(),
            ));
        }
        if self.required_markers.is_empty() {
            return Err(PaygateError::InvalidConfig(
                "At least one required marker must be configured".into(),
            ));
        }
        if self.required_markers.iter().any(|m| m.is_empty()) {
            return Err(PaygateError::InvalidConfig(
                "Required markers must not be empty strings".into(),
            ));
        }
        Ok(())
    }

    fn issuer_matches(&self, producer: &str) -> bool {
        self.issuer.trim().to_lowercase() == producer.trim().to_lowercase()
    }
}

/// Judge a document. Pure and deterministic for identical inputs.
///
/// The issuer check runs first, then each marker in configuration order; the
/// first failure becomes the rejection reason.
pub fn verify(
    rules: &AcceptanceRules,
    content: &ExtractedContent,
    metadata: &DocumentMetadata,
) -> AcceptanceVerdict {
    if metadata.producer.trim().is_empty() {
        return AcceptanceVerdict::Rejected(RejectionReason::MissingMetadata);
    }

    if !rules.issuer_matches(&metadata.producer) {
        debug!(
            expected = %rules.issuer,
            found = %metadata.producer,
            "Issuer mismatch"
        );
        return AcceptanceVerdict::Rejected(RejectionReason::IssuerMismatch {
            expected: rules.issuer.clone(),
            found: metadata.producer.clone(),
        });
    }

    let missing: Vec<&String> = rules
        .required_markers
        .iter()
        .filter(|m| !content.contains(m))
        .collect();

    match missing.first() {
        None => AcceptanceVerdict::Accepted,
        Some(first) => {
            debug!(missing = ?missing, "Required markers not found");
            AcceptanceVerdict::Rejected(RejectionReason::MissingMarker {
                marker: (*first).clone(),
            })
        }
    }
}
