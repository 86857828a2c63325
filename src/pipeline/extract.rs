//! Text extraction: staged document → [`ExtractedContent`].
//!
//! PDFs are rasterised page by page at the configured DPI and each page image
//! is handed to the OCR engine in page order. Image receipts skip rendering
//! and go straight to OCR as a single page.
//!
//! One failed page fails the whole extraction. Continuing on partial text
//! could hide a required marker, or let a marker from an unrelated page
//! decide the verdict.

use crate::config::VerifierConfig;
use crate::error::PaygateError;
use crate::output::{ExtractedContent, PageText};
use crate::pipeline::intake::{DocumentKind, StagedDocument};
use crate::pipeline::normalize::clean_page_text;
use crate::pipeline::ocr::{OcrEngine, TesseractCli};
use crate::pipeline::render;
use crate::progress::VerificationProgressCallback;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// Produce page texts for a staged document. Blocking.
pub trait TextExtractor: Send + Sync {
    fn extract(
        &self,
        document: &StagedDocument,
        progress: Option<&dyn VerificationProgressCallback>,
    ) -> Result<ExtractedContent, PaygateError>;
}

/// pdfium rasterisation followed by per-page OCR.
pub struct OcrTextExtractor {
    ocr: Arc<dyn OcrEngine>,
    dpi: u32,
    max_rendered_pixels: u32,
    pdfium_lib_path: Option<PathBuf>,
}

impl OcrTextExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>, config: &VerifierConfig) -> Self {
        Self {
            ocr,
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            pdfium_lib_path: config.pdfium_lib_path.clone(),
        }
    }

    /// Tesseract CLI engine configured from `config`.
    pub fn from_config(config: &VerifierConfig) -> Self {
        let ocr = TesseractCli::new(&config.tesseract_program, &config.language)
            .with_page_segmentation(config.page_segmentation);
        Self::new(Arc::new(ocr), config)
    }

    fn extract_pdf(
        &self,
        document: &StagedDocument,
        progress: Option<&dyn VerificationProgressCallback>,
    ) -> Result<Vec<PageText>, PaygateError> {
        let pdfium = render::shared_pdfium(self.pdfium_lib_path.as_deref())?;
        let pdf = render::open_document(pdfium, document.path(), document.filename())?;
        let total_pages = pdf.pages().len() as usize;
        if total_pages == 0 {
            return Err(PaygateError::UnsupportedDocument {
                filename: document.filename().to_string(),
                expected: "PDF".to_string(),
                detail: "document has no pages".to_string(),
            });
        }
        info!("{}: {} pages at {} DPI", document.filename(), total_pages, self.dpi);
        if let Some(cb) = progress {
            cb.on_extraction_start(total_pages);
        }

        let render_config = render::render_config(self.dpi, self.max_rendered_pixels);
        let scratch = TempDir::new().map_err(|e| PaygateError::Internal(format!("tempdir: {e}")))?;

        self.recognise_pages(
            total_pages,
            scratch.path(),
            |index, out| render::render_page_to_png(&pdf, index, &render_config, out),
            progress,
        )
    }

    /// Render each page into `scratch`, recognise it, and delete the image
    /// before moving on. Stops at the first failing page.
    fn recognise_pages<R>(
        &self,
        total_pages: usize,
        scratch: &Path,
        mut render_page: R,
        progress: Option<&dyn VerificationProgressCallback>,
    ) -> Result<Vec<PageText>, PaygateError>
    where
        R: FnMut(usize, &Path) -> Result<(), PaygateError>,
    {
        let mut pages = Vec::with_capacity(total_pages);
        for index in 0..total_pages {
            let page_num = index + 1;
            let image_path = scratch.join(format!("page-{}.png", page_num));
            render_page(index, &image_path)?;

            let recognised = self.ocr.recognise(&image_path, page_num);
            // Page images are not kept past recognition.
            if let Err(e) = std::fs::remove_file(&image_path) {
                debug!("Page {}: could not remove {}: {}", page_num, image_path.display(), e);
            }
            let text = clean_page_text(&recognised?);

            debug!("Page {}: {} chars after cleanup", page_num, text.chars().count());
            if let Some(cb) = progress {
                cb.on_page_recognised(page_num, total_pages, text.chars().count());
            }
            pages.push(PageText { page_num, text });
        }
        Ok(pages)
    }

    fn extract_image(
        &self,
        document: &StagedDocument,
        progress: Option<&dyn VerificationProgressCallback>,
    ) -> Result<Vec<PageText>, PaygateError> {
        let (width, height) = image::image_dimensions(document.path()).map_err(|e| {
            PaygateError::UnsupportedDocument {
                filename: document.filename().to_string(),
                expected: "image".to_string(),
                detail: e.to_string(),
            }
        })?;
        info!("{}: image {}x{} px", document.filename(), width, height);
        if let Some(cb) = progress {
            cb.on_extraction_start(1);
        }

        let text = clean_page_text(&self.ocr.recognise(document.path(), 1)?);
        if let Some(cb) = progress {
            cb.on_page_recognised(1, 1, text.chars().count());
        }
        Ok(vec![PageText { page_num: 1, text }])
    }
}

impl TextExtractor for OcrTextExtractor {
    fn extract(
        &self,
        document: &StagedDocument,
        progress: Option<&dyn VerificationProgressCallback>,
    ) -> Result<ExtractedContent, PaygateError> {
        let pages = match document.kind() {
            DocumentKind::Pdf => self.extract_pdf(document, progress)?,
            DocumentKind::Image(_) => self.extract_image(document, progress)?,
        };
        Ok(ExtractedContent::from_pages(pages))
    }
}
