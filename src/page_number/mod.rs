//! Page Number Validation module
//!
//! Checks that the number printed on every page of a document matches the
//! page's physical position.
//!
//! # Features
//!
//! - Percentage-based search regions with per-request overrides
//! - Ordered pattern matching on noisy OCR output
//! - Sequential, page-at-a-time validation with a configurable render failure policy
//! - Aggregate statistics and per-page issues
//!
//! # Example
//!
//! ```rust,no_run
//! use pdf_page_validator::{Config, PageValidator, RegionSpec};
//! use std::path::Path;
//!
//! let config = Config::default();
//! let validator = PageValidator::from_config(&config).unwrap();
//!
//! let region = RegionSpec::new(0.4, 0.2, 0.9, 0.08);
//! let report = validator
//!     .validate_page_numbers(Path::new("book.pdf"), 100, Some(&region))
//!     .unwrap();
//! println!("{:.2}% correct", report.success_rate);
//! ```

// Submodules
mod extract;
mod region;
mod types;
mod validate;

// Re-export public API
pub use extract::{parse_page_number, Extraction, NumberExtractor};
pub use region::{
    resolve, CropRect, RegionError, RegionSpec, DEFAULT_FOOTER_HEIGHT,
    DEFAULT_FOOTER_Y_START_FROM_BOTTOM, DEFAULT_WIDTH, DEFAULT_X_START,
};
pub use types::{
    expected_number, ExtractError, PageNumberError, PageResult, RenderFailurePolicy, Result,
    ValidationReport, ValidatorSettings, ValidatorSettingsBuilder, DEFAULT_DPI, MAX_DPI, MIN_DPI,
    NONE_LABEL,
};
pub use validate::PageValidator;
