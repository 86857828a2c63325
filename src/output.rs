//! Data types flowing through and out of the verification pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identity of the user who submitted a document.
///
/// The messaging layer may hand us numeric chat ids or string handles; both
/// are stored as text so the ledger never has to care which.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Text recognised on a single page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-indexed page number.
    pub page_num: usize,
    pub text: String,
}

/// Ordered page texts plus their flat concatenation.
///
/// Built once by the text extractor and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pages: Vec<PageText>,
    text: String,
}

impl ExtractedContent {
    /// Assemble content from page texts, sorted into page order.
    ///
    /// Each page is preceded by `----- Page N -----` on its own line, so a
    /// marker can only be missed if it straddles two pages.
    pub fn from_pages(mut pages: Vec<PageText>) -> Self {
        pages.sort_by_key(|p| p.page_num);
        let mut text = String::new();
        for page in &pages {
            text.push_str(&page_separator(page.page_num));
            text.push_str(&page.text);
            text.push_str("\n\n");
        }
        Self { pages, text }
    }

    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    /// Concatenated text of every page, separators included.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }
}

/// Separator line written before each page in [`ExtractedContent::text`].
pub fn page_separator(page_num: usize) -> String {
    format!("----- Page {} -----\n", page_num)
}

/// Container-level metadata read without rendering any page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Application that produced the file. Matched against the expected issuer.
    pub producer: String,
    pub creator: Option<String>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub creation_date: Option<String>,
    pub page_count: usize,
}

/// Why the rule engine turned a document down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    /// The producer field names a different issuer: wrong document.
    IssuerMismatch { expected: String, found: String },
    /// Right issuer but a required marker was not recognised.
    MissingMarker { marker: String },
    /// The container has no producer field to check.
    MissingMetadata,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::IssuerMismatch { expected, found } => write!(
                f,
                "issuer mismatch: document produced by '{}', expected '{}'",
                found, expected
            ),
            RejectionReason::MissingMarker { marker } => {
                write!(f, "missing marker: '{}' not found in receipt text", marker)
            }
            RejectionReason::MissingMetadata => {
                write!(f, "missing metadata: document has no producer field")
            }
        }
    }
}

/// Output of the rule engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum AcceptanceVerdict {
    Accepted,
    Rejected(RejectionReason),
}

impl AcceptanceVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AcceptanceVerdict::Accepted)
    }
}

/// A durable proof that a user has paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub user: UserId,
    pub paid_at: DateTime<Utc>,
}
