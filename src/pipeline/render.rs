//! PDF access through pdfium: rasterise pages and read container metadata.
//!
//! Everything here is blocking. Callers run it on tokio's blocking pool; the
//! pdfium C++ library keeps internal state and must not be driven from an
//! async worker thread.
//!
//! The library is bound once per process and reused: pdfium initialises
//! global state on bind and tears it down when a `Pdfium` value is dropped,
//! so two live bindings would step on each other.

use crate::error::PaygateError;
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

static PDFIUM: Mutex<Option<&'static Pdfium>> = Mutex::new(None);

/// Bind to pdfium, or return the existing process-wide binding.
///
/// `lib_dir` only matters on the first successful call.
pub fn shared_pdfium(lib_dir: Option<&Path>) -> Result<&'static Pdfium, PaygateError> {
    let mut slot = PDFIUM
        .lock()
        .map_err(|_| PaygateError::Internal("pdfium binding lock poisoned".into()))?;
    if let Some(pdfium) = *slot {
        return Ok(pdfium);
    }

    let bindings = match lib_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PaygateError::PdfiumBindingFailed(format!("{:?}", e)))?;

    let pdfium: &'static Pdfium = Box::leak(Box::new(Pdfium::new(bindings)));
    *slot = Some(pdfium);
    info!("pdfium bound");
    Ok(pdfium)
}

/// Open a staged PDF, mapping parse failures to `UnsupportedDocument`.
pub fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    filename: &str,
) -> Result<PdfDocument<'a>, PaygateError> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| PaygateError::UnsupportedDocument {
            filename: filename.to_string(),
            expected: "PDF".to_string(),
            detail: format!("{:?}", e),
        })
}

/// Render settings for OCR: scale to `dpi`, cap either side at `max_pixels`.
pub fn render_config(dpi: u32, max_pixels: u32) -> PdfRenderConfig {
    // PDF user space is 72 units per inch.
    PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32)
}

/// Rasterise one page (0-based `index`) and write it as PNG to `out`.
///
/// The bitmap is dropped before returning; only the PNG on disk remains.
pub fn render_page_to_png(
    document: &PdfDocument<'_>,
    index: usize,
    render_config: &PdfRenderConfig,
    out: &Path,
) -> Result<(), PaygateError> {
    let page_num = index + 1;
    let page = document
        .pages()
        .get(index as u16)
        .map_err(|e| PaygateError::RenderFailure {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| PaygateError::RenderFailure {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page_num,
        image.width(),
        image.height()
    );

    image
        .save_with_format(out, image::ImageFormat::Png)
        .map_err(|e| PaygateError::RenderFailure {
            page: page_num,
            detail: format!("PNG encoding failed: {}", e),
        })
}

/// Container metadata fields, each `None` when absent or empty.
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    pub producer: Option<String>,
    pub creator: Option<String>,
    pub author: Option<String>,
    pub title: Option<String>,
    pub creation_date: Option<String>,
    pub page_count: usize,
}

/// Read the document information dictionary without rendering.
pub fn read_metadata(document: &PdfDocument<'_>) -> RawMetadata {
    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    RawMetadata {
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        title: get_meta(PdfDocumentMetadataTagType::Title),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        page_count: document.pages().len() as usize,
    }
}
