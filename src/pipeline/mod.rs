//! Pipeline stages for receipt verification.
//!
//! Each submodule implements one step. Extraction and metadata reading sit
//! behind traits so the verifier can run them side by side and tests can
//! swap in fixed outputs.
//!
//! ## Data Flow
//!
//! ```text
//!              ┌──▶ extract (render ─▶ ocr ─▶ normalize) ──┐
//! intake ──────┤                                           ├──▶ rules
//! (temp file)  └──▶ metadata (pdfium info dictionary) ─────┘
//! ```
//!
//! 1. [`intake`]   : classify the declared type, check magic bytes, stage to a temp file
//! 2. [`render`]   : pdfium binding, page rasterisation, metadata dictionary
//! 3. [`ocr`]      : per-page character recognition (tesseract CLI by default)
//! 4. [`normalize`]: whitespace and invisible-character cleanup of OCR output
//! 5. [`extract`]  : drives 2–4 page by page into `ExtractedContent`
//! 6. [`metadata`] : producer field and friends, no rendering

pub mod extract;
pub mod intake;
pub mod metadata;
pub mod normalize;
pub mod ocr;
pub mod render;
