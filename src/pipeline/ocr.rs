//! Optical character recognition of a single page image.
//!
//! The default engine shells out to the `tesseract` CLI, which prints the
//! recognised text to stdout when given `stdout` as its output base. The
//! engine is behind [`OcrEngine`] so tests and alternative backends can
//! replace it without touching rendering.

use crate::error::PaygateError;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Recognise text on one rasterised page.
pub trait OcrEngine: Send + Sync {
    /// * `image_path`: PNG/JPEG/TIFF on disk
    /// * `page_num`  : 1-indexed, used only for error reporting
    fn recognise(&self, image_path: &Path, page_num: usize) -> Result<String, PaygateError>;
}

/// `tesseract <image> stdout -l <lang> [--psm N]`.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: String,
    language: String,
    page_segmentation: Option<u8>,
}

impl TesseractCli {
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
            page_segmentation: None,
        }
    }

    pub fn with_page_segmentation(mut self, psm: Option<u8>) -> Self {
        self.page_segmentation = psm;
        self
    }

    fn command(&self, image_path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language);
        if let Some(psm) = self.page_segmentation {
            cmd.arg("--psm").arg(psm.to_string());
        }
        cmd
    }
}

impl OcrEngine for TesseractCli {
    fn recognise(&self, image_path: &Path, page_num: usize) -> Result<String, PaygateError> {
        let output = self
            .command(image_path)
            .output()
            .map_err(|e| PaygateError::OcrUnavailable {
                program: self.program.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PaygateError::OcrFailed {
                page: page_num,
                detail: format!(
                    "exit {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("Page {}: tesseract returned {} chars", page_num, text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_includes_language_and_psm() {
        let engine = TesseractCli::new("tesseract", "rus").with_page_segmentation(Some(6));
        let cmd = engine.command(Path::new("/tmp/page-1.png"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec!["/tmp/page-1.png", "stdout", "-l", "rus", "--psm", "6"]
        );
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let engine = TesseractCli::new("paygate-definitely-not-installed", "rus");
        let err = engine
            .recognise(Path::new("/tmp/none.png"), 1)
            .unwrap_err();
        assert!(matches!(err, PaygateError::OcrUnavailable { .. }));
    }
}
