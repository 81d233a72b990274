//! OCR (Optical Character Recognition) module
//!
//! The search only needs "image in, text out". [`TesseractOcr`] provides that
//! by running the `tesseract` command-line program on a temporary PNG.

use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use crate::config::OcrSettings;

/// Text recognition capability
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text in an 8-bit grayscale image. Empty text means
    /// nothing was recognized.
    fn recognize(&self, image: &GrayImage) -> Result<String>;
}

impl<F> TextRecognizer for F
where
    F: Fn(&GrayImage) -> Result<String> + Send + Sync,
{
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        self(image)
    }
}

/// Tesseract command-line adapter
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    program: PathBuf,
    language: String,
    page_segmentation_mode: u32,
    tessdata_dir: Option<PathBuf>,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::from_settings(&OcrSettings::default())
    }
}

impl TesseractOcr {
    pub fn from_settings(settings: &OcrSettings) -> Self {
        Self {
            program: settings.program.clone(),
            language: settings.language.clone(),
            page_segmentation_mode: settings.page_segmentation_mode,
            tessdata_dir: settings.tessdata_dir.clone(),
        }
    }

    fn command(&self, input: &std::path::Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string());
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
        command
    }
}

impl TextRecognizer for TesseractOcr {
    fn recognize(&self, image: &GrayImage) -> Result<String> {
        let mut tmp = tempfile::Builder::new()
            .prefix("cardscan-")
            .suffix(".png")
            .tempfile()
            .context("Failed to create temp file for OCR")?;
        image
            .write_to(&mut tmp, image::ImageFormat::Png)
            .context("Failed to write temp image for OCR")?;
        tmp.flush().context("Failed to flush temp image for OCR")?;

        let output = self
            .command(tmp.path())
            .output()
            .with_context(|| format!("Failed to run {:?} (is it installed?)", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_arguments() {
        let settings = OcrSettings {
            program: PathBuf::from("/usr/bin/tesseract"),
            language: "deu".to_string(),
            page_segmentation_mode: 8,
            tessdata_dir: Some(PathBuf::from("/opt/tessdata")),
        };
        let ocr = TesseractOcr::from_settings(&settings);
        let command = ocr.command(std::path::Path::new("/tmp/title.png"));

        assert_eq!(command.get_program(), "/usr/bin/tesseract");
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["/tmp/title.png", "stdout", "-l", "deu", "--psm", "8", "--tessdata-dir", "/opt/tessdata"]
        );
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let settings = OcrSettings {
            program: PathBuf::from("/nonexistent/tesseract"),
            ..OcrSettings::default()
        };
        let ocr = TesseractOcr::from_settings(&settings);
        assert!(ocr.recognize(&GrayImage::new(10, 10)).is_err());
    }

    #[test]
    fn test_closure_recognizer() {
        let recognizer = |_: &GrayImage| -> Result<String> { Ok("Forest\n".to_string()) };
        assert_eq!(recognizer.recognize(&GrayImage::new(1, 1)).unwrap(), "Forest\n");
    }
}
