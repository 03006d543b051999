//! Page Number module core types
//!
//! Contains the per-page verdict, the aggregate report, validator settings and
//! the error types shared by the extractor and the validator.

use image::DynamicImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::region::{CropRect, RegionSpec};
use crate::config::Config;
use crate::ocr::OcrError;

// ============================================================
// Constants
// ============================================================

/// Default render resolution
pub const DEFAULT_DPI: u32 = 100;

/// Lowest accepted render resolution
pub const MIN_DPI: u32 = 1;

/// Highest accepted render resolution
pub const MAX_DPI: u32 = 1200;

/// Placeholder for a missing number in issue descriptions
pub const NONE_LABEL: &str = "none";

// ============================================================
// Error Types
// ============================================================

/// Validation error types
#[derive(Debug, Error)]
pub enum PageNumberError {
    #[error("{dependency} is unavailable or misconfigured: {reason}\n\n{remedy}")]
    Configuration {
        dependency: String,
        reason: String,
        remedy: String,
    },

    #[error("PDF not found or unreadable: {} ({reason})", .path.display())]
    DocumentNotFound { path: PathBuf, reason: String },

    #[error("Failed to render page {}: {reason}", .page_index + 1)]
    RenderFailed { page_index: usize, reason: String },

    #[error("DPI must be between {min} and {max}, got {0}", min = MIN_DPI, max = MAX_DPI)]
    InvalidDpi(u32),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PageNumberError {
    /// True for errors caused by the input document rather than the setup
    pub fn is_not_found(&self) -> bool {
        matches!(self, PageNumberError::DocumentNotFound { .. })
    }

    /// True for errors that make the validator instance unusable
    pub fn is_configuration(&self) -> bool {
        matches!(self, PageNumberError::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, PageNumberError>;

/// Failures inside the number extractor.
///
/// These never leave the extractor: they are logged and turned into
/// "no number detected".
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Crop rectangle {rect} does not fit a {width}x{height} image")]
    InvalidRegion { rect: CropRect, width: u32, height: u32 },

    #[error(transparent)]
    Ocr(#[from] OcrError),
}

// ============================================================
// Core Data Structures
// ============================================================

/// Verdict for a single page
#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    /// Page index (0-indexed)
    pub page_index: usize,
    /// Number the page should carry (`page_index + 1`)
    #[serde(rename = "actual_number")]
    pub expected_number: u32,
    /// Number recognized in the footer region
    pub detected_number: Option<u32>,
    /// Detected number equals the expected number
    pub is_valid: bool,
    /// Region that was inspected, kept for previews
    #[serde(skip)]
    pub cropped_image: Option<DynamicImage>,
}

impl PageResult {
    /// Build the verdict for page `page_index`
    pub fn new(
        page_index: usize,
        detected_number: Option<u32>,
        cropped_image: Option<DynamicImage>,
    ) -> Self {
        let expected_number = expected_number(page_index);
        Self {
            page_index,
            expected_number,
            detected_number,
            is_valid: detected_number == Some(expected_number),
            cropped_image,
        }
    }

    /// 1-based page position
    pub fn page_number(&self) -> usize {
        self.page_index + 1
    }

    /// Human-readable issue for invalid pages
    pub fn issue(&self) -> Option<String> {
        if self.is_valid {
            return None;
        }
        let detected = self
            .detected_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| NONE_LABEL.to_string());
        Some(format!(
            "page {}: expected {}, detected {}",
            self.page_number(),
            self.expected_number,
            detected
        ))
    }
}

/// Expected printed number for a zero-based page index
pub fn expected_number(page_index: usize) -> u32 {
    u32::try_from(page_index + 1).unwrap_or(u32::MAX)
}

/// Aggregate outcome for a whole document
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub total_pages: usize,
    pub correct_pages: usize,
    pub error_pages: usize,
    /// Percentage of correct pages, `0.0` for an empty document
    pub success_rate: f64,
    #[serde(rename = "validation_results")]
    pub results: Vec<PageResult>,
    pub issues: Vec<String>,
}

impl ValidationReport {
    /// Derive the report from per-page results
    pub fn from_results(results: Vec<PageResult>) -> Self {
        let total_pages = results.len();
        let correct_pages = results.iter().filter(|r| r.is_valid).count();
        let issues = results.iter().filter_map(PageResult::issue).collect();

        let success_rate = if total_pages > 0 {
            correct_pages as f64 / total_pages as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_pages,
            correct_pages,
            error_pages: total_pages - correct_pages,
            success_rate,
            results,
            issues,
        }
    }

    /// True when every page carries its expected number
    pub fn all_valid(&self) -> bool {
        self.error_pages == 0
    }

    /// Detected numbers in page order
    pub fn detected_numbers(&self) -> Vec<Option<u32>> {
        self.results.iter().map(|r| r.detected_number).collect()
    }
}

// ============================================================
// Settings
// ============================================================

/// What to do when a page cannot be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFailurePolicy {
    /// Abort the whole validation and return the error
    #[default]
    Abort,
    /// Record the page as "no number detected" and continue
    MarkPageInvalid,
}

/// Validator settings
#[derive(Debug, Clone)]
pub struct ValidatorSettings {
    /// Region used when a request has no override
    pub default_region: RegionSpec,
    /// Render failure handling
    pub render_failure: RenderFailurePolicy,
    /// Keep inspected crops in the results
    pub retain_crops: bool,
    /// Dump every inspected crop to this directory
    pub debug_crop_dir: Option<PathBuf>,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            default_region: RegionSpec::default(),
            render_failure: RenderFailurePolicy::Abort,
            retain_crops: true,
            debug_crop_dir: None,
        }
    }
}

impl ValidatorSettings {
    /// Create a new settings builder
    pub fn builder() -> ValidatorSettingsBuilder {
        ValidatorSettingsBuilder::default()
    }

    /// Settings derived from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_region: config.region.to_region_spec(),
            debug_crop_dir: config
                .debug
                .save_crops
                .then(|| config.debug.crop_dir.clone()),
            ..Default::default()
        }
    }

    /// Region for a request: the override if any, else the default
    pub fn region_for(&self, region_override: Option<&RegionSpec>) -> RegionSpec {
        region_override.copied().unwrap_or(self.default_region)
    }
}

/// Builder for ValidatorSettings
#[derive(Debug, Default)]
pub struct ValidatorSettingsBuilder {
    settings: ValidatorSettings,
}

impl ValidatorSettingsBuilder {
    /// Set the default region
    #[must_use]
    pub fn default_region(mut self, region: RegionSpec) -> Self {
        self.settings.default_region = region;
        self
    }

    /// Set the render failure policy
    #[must_use]
    pub fn render_failure(mut self, policy: RenderFailurePolicy) -> Self {
        self.settings.render_failure = policy;
        self
    }

    /// Set whether crops are kept in the results
    #[must_use]
    pub fn retain_crops(mut self, retain: bool) -> Self {
        self.settings.retain_crops = retain;
        self
    }

    /// Save inspected crops into `dir`
    #[must_use]
    pub fn debug_crop_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.settings.debug_crop_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Build the settings
    #[must_use]
    pub fn build(self) -> ValidatorSettings {
        self.settings
    }
}
