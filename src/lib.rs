//! pdf-page-validator - Verify printed page numbers of scanned PDFs
//!
//! Every page is rendered, a small footer region is read with OCR and the
//! number found there is compared with the page's position in the document.
//!
//! # Modules
//!
//! - [`page_number`] - region geometry, number extraction and validation
//! - [`ocr`] - OCR backend trait and the Tesseract implementation
//! - [`rasterize`] - PDF opening and page rendering
//! - [`report`] - text and CSV reports
//! - [`config`] - file, environment and CLI configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use pdf_page_validator::{report, Config, PageValidator};
//! use std::path::Path;
//!
//! let config = Config::load().unwrap_or_default();
//! let validator = PageValidator::from_config(&config).unwrap();
//! let result = validator
//!     .validate_page_numbers(Path::new("book.pdf"), config.ocr.default_dpi, None)
//!     .unwrap();
//!
//! println!("{}", report::render(&result));
//! ```

pub mod cli;
pub mod config;
pub mod logging;
pub mod ocr;
pub mod page_number;
pub mod progress;
pub mod rasterize;
pub mod report;
pub mod util;

#[cfg(feature = "web")]
pub mod web;

// CLI
pub use cli::{Cli, Commands, ExitCode, InfoArgs, ValidateArgs};
#[cfg(feature = "web")]
pub use cli::ServeArgs;

// Config
pub use config::{CliOverrides, Config, ConfigError};

// OCR and rendering
pub use ocr::{OcrBackend, OcrError, PageSegMode, SerializedOcr, TesseractBackend};
pub use rasterize::{PdftoppmRasterizer, RasterDocument, RasterError, Rasterizer};

// Page number validation
pub use page_number::{
    parse_page_number, resolve, CropRect, Extraction, NumberExtractor, PageNumberError,
    PageResult, PageValidator, RegionError, RegionSpec, RenderFailurePolicy, ValidationReport,
    ValidatorSettings,
};

// Progress
pub use progress::{NoProgress, OutputMode, PageProgressBar, ValidationProgress};

// Report
pub use report::ReportError;

// Web
#[cfg(feature = "web")]
pub use web::{ServerConfig, ServerError, WebServer};

/// Exit codes for CLI (mirrors [`ExitCode`])
pub mod exit_codes {
    use super::ExitCode;

    pub const SUCCESS: i32 = ExitCode::Success as i32;
    pub const GENERAL_ERROR: i32 = ExitCode::GeneralError as i32;
    pub const INVALID_ARGS: i32 = ExitCode::InvalidArgs as i32;
    pub const INPUT_NOT_FOUND: i32 = ExitCode::InputNotFound as i32;
    pub const OUTPUT_ERROR: i32 = ExitCode::OutputError as i32;
    pub const PROCESSING_ERROR: i32 = ExitCode::ProcessingError as i32;
    pub const PAGE_MISMATCH: i32 = ExitCode::PageMismatch as i32;
    pub const EXTERNAL_TOOL_ERROR: i32 = ExitCode::ExternalToolError as i32;
}

/// Map a validation error to the process exit code
pub fn exit_code_for(error: &PageNumberError) -> ExitCode {
    match error {
        PageNumberError::Configuration { .. } => ExitCode::ExternalToolError,
        PageNumberError::DocumentNotFound { .. } => ExitCode::InputNotFound,
        PageNumberError::InvalidDpi(_) => ExitCode::InvalidArgs,
        PageNumberError::RenderFailed { .. } | PageNumberError::IoError(_) => {
            ExitCode::ProcessingError
        }
    }
}
