//! OCR backend
//!
//! Text recognition is an external service: the validator only needs
//! "grayscale image in, text out". [`TesseractBackend`] shells out to the
//! `tesseract` binary; tests and alternative engines implement [`OcrBackend`].

use image::GrayImage;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Default OCR language
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Installation instructions shown when Tesseract cannot be found
pub const TESSERACT_INSTALL_HINT: &str = "Install Tesseract OCR for your platform:\n\
  - Windows: download the installer from https://github.com/UB-Mannheim/tesseract/wiki\n\
  - macOS:   brew install tesseract\n\
  - Linux:   sudo apt-get install tesseract-ocr\n\
Then make sure it is on PATH or set TESSERACT_PATH / ocr.tesseract_path to the executable.";

// ============================================================
// Error Types
// ============================================================

/// OCR error types
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine unavailable at {binary}: {reason}")]
    Unavailable { binary: PathBuf, reason: String },

    #[error("OCR failed: {0}")]
    Failed(String),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OcrError>;

// ============================================================
// Backend Trait
// ============================================================

/// Tesseract page segmentation modes used by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSegMode {
    /// Assume a single uniform block of text (`--psm 6`)
    #[default]
    SingleBlock,
    /// Treat the image as a single text line (`--psm 7`)
    SingleLine,
    /// Fully automatic segmentation (`--psm 3`)
    Auto,
}

impl PageSegMode {
    /// Numeric `--psm` value
    pub fn psm(&self) -> u8 {
        match self {
            PageSegMode::SingleBlock => 6,
            PageSegMode::SingleLine => 7,
            PageSegMode::Auto => 3,
        }
    }
}

/// Image-to-text service
pub trait OcrBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Recognize the text in a grayscale image.
    ///
    /// May return empty or nonsensical text; only engine failures are errors.
    fn recognize(&self, image: &GrayImage, mode: PageSegMode) -> Result<String>;
}

// ============================================================
// Tesseract
// ============================================================

/// OCR backend that runs the `tesseract` command-line tool
#[derive(Debug, Clone)]
pub struct TesseractBackend {
    binary: PathBuf,
    language: String,
    version: String,
}

impl TesseractBackend {
    /// Locate Tesseract and verify that it runs.
    ///
    /// `binary` overrides the `PATH` lookup.
    pub fn new(binary: Option<&Path>, language: impl Into<String>) -> Result<Self> {
        let binary = match binary {
            Some(path) => path.to_path_buf(),
            None => which::which("tesseract").map_err(|e| OcrError::Unavailable {
                binary: PathBuf::from("tesseract"),
                reason: e.to_string(),
            })?,
        };

        let output = Command::new(&binary)
            .arg("--version")
            .output()
            .map_err(|e| OcrError::Unavailable {
                binary: binary.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(OcrError::Unavailable {
                binary,
                reason: format!("`--version` exited with {}", output.status),
            });
        }

        // Older releases print the version banner on stderr
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        let version = banner.lines().next().unwrap_or("").trim().to_string();

        info!(binary = %binary.display(), %version, "Tesseract OCR engine initialised");

        Ok(Self {
            binary,
            language: language.into(),
            version,
        })
    }

    /// Path of the executable in use
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Recognition language (e.g. `eng`)
    pub fn language(&self) -> &str {
        &self.language
    }

    /// First line of `tesseract --version`
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage, mode: PageSegMode) -> Result<String> {
        let input = tempfile::Builder::new()
            .prefix("ocr_input_")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(input.path(), image::ImageFormat::Png)?;

        let output = Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(mode.psm().to_string())
            .output()
            .map_err(|e| OcrError::Failed(format!("failed to run tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(chars = text.len(), "tesseract finished");
        Ok(text)
    }
}

// ============================================================
// Serialized access
// ============================================================

/// Wraps a backend so that at most one recognition runs at a time.
///
/// Used when a single validator is shared between concurrent requests and
/// the engine underneath is not known to be reentrant.
pub struct SerializedOcr<B> {
    inner: B,
    gate: Mutex<()>,
}

impl<B: OcrBackend> SerializedOcr<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }

    /// Access the wrapped backend
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: OcrBackend> OcrBackend for SerializedOcr<B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn recognize(&self, image: &GrayImage, mode: PageSegMode) -> Result<String> {
        // A panic inside another recognition leaves no state behind the gate
        let _guard = self.gate.lock().unwrap_or_else(|e| e.into_inner());
        self.inner.recognize(image, mode)
    }
}
