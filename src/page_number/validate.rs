//! Page Validator
//!
//! Walks a document page by page, reads the printed number of each page and
//! compares it with the page's position.

use std::path::Path;
use tracing::{info, warn};

use super::extract::NumberExtractor;
use super::region::{self, RegionSpec};
use super::types::{
    PageNumberError, PageResult, RenderFailurePolicy, Result, ValidationReport,
    ValidatorSettings, MAX_DPI, MIN_DPI,
};
use crate::config::Config;
use crate::ocr::{OcrBackend, SerializedOcr, TesseractBackend, TESSERACT_INSTALL_HINT};
use crate::progress::{NoProgress, ValidationProgress};
use crate::rasterize::{PdftoppmRasterizer, RasterError, Rasterizer, PDFTOPPM_INSTALL_HINT};

/// Validates the printed page numbers of PDF documents.
///
/// A validator holds no per-document state and can be shared between
/// threads; every call opens its own document handle and releases it before
/// returning.
pub struct PageValidator {
    settings: ValidatorSettings,
    rasterizer: Box<dyn Rasterizer>,
    extractor: NumberExtractor,
}

impl PageValidator {
    /// Create a validator from explicit parts.
    ///
    /// Creates the debug crop directory if one is configured.
    pub fn new(
        settings: ValidatorSettings,
        rasterizer: Box<dyn Rasterizer>,
        ocr: Box<dyn OcrBackend>,
    ) -> Result<Self> {
        if let Some(dir) = &settings.debug_crop_dir {
            std::fs::create_dir_all(dir)?;
            info!(dir = %dir.display(), "Saving inspected crops");
        }

        let extractor =
            NumberExtractor::new(ocr).with_debug_crop_dir(settings.debug_crop_dir.clone());

        Ok(Self {
            settings,
            rasterizer,
            extractor,
        })
    }

    /// Create a validator backed by Tesseract and Poppler.
    ///
    /// Fails with [`PageNumberError::Configuration`] when either tool cannot
    /// be found or does not run.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_settings(config, ValidatorSettings::from_config(config))
    }

    /// Like [`from_config`](Self::from_config) with explicit settings
    pub fn from_config_with_settings(config: &Config, settings: ValidatorSettings) -> Result<Self> {
        let tesseract =
            TesseractBackend::new(config.ocr.tesseract_path.as_deref(), &config.ocr.language)
                .map_err(|e| PageNumberError::Configuration {
                    dependency: "Tesseract OCR".to_string(),
                    reason: e.to_string(),
                    remedy: TESSERACT_INSTALL_HINT.to_string(),
                })?;

        let rasterizer = PdftoppmRasterizer::new().map_err(|e| PageNumberError::Configuration {
            dependency: "Poppler (pdftoppm)".to_string(),
            reason: e.to_string(),
            remedy: PDFTOPPM_INSTALL_HINT.to_string(),
        })?;

        Self::new(
            settings,
            Box::new(rasterizer),
            Box::new(SerializedOcr::new(tesseract)),
        )
    }

    /// Settings in use
    pub fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    /// Name of the OCR backend
    pub fn ocr_backend(&self) -> &str {
        self.extractor.backend().name()
    }

    /// Validate every page of `path`.
    ///
    /// `region_override`, when given, replaces the configured region for this
    /// call only.
    pub fn validate_page_numbers(
        &self,
        path: &Path,
        dpi: u32,
        region_override: Option<&RegionSpec>,
    ) -> Result<ValidationReport> {
        self.validate_with_progress(path, dpi, region_override, &NoProgress)
    }

    /// Same as [`validate_page_numbers`](Self::validate_page_numbers), reporting
    /// each page to `progress` as it is judged
    pub fn validate_with_progress(
        &self,
        path: &Path,
        dpi: u32,
        region_override: Option<&RegionSpec>,
        progress: &dyn ValidationProgress,
    ) -> Result<ValidationReport> {
        if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
            return Err(PageNumberError::InvalidDpi(dpi));
        }

        let region = self.settings.region_for(region_override);
        let mut document = self
            .rasterizer
            .open(path)
            .map_err(|e| open_error(path, e))?;
        let page_count = document.page_count();

        info!(
            path = %path.display(),
            pages = page_count,
            dpi,
            %region,
            "Validating page numbers"
        );
        progress.on_start(page_count);

        let mut results = Vec::with_capacity(page_count);
        for page_index in 0..page_count {
            let page_image = match document.render_page(page_index, dpi) {
                Ok(image) => image,
                Err(e) => match self.settings.render_failure {
                    RenderFailurePolicy::Abort => {
                        return Err(PageNumberError::RenderFailed {
                            page_index,
                            reason: e.to_string(),
                        });
                    }
                    RenderFailurePolicy::MarkPageInvalid => {
                        warn!(page = page_index + 1, "Render failed, marking page invalid: {}", e);
                        let result = PageResult::new(page_index, None, None);
                        progress.on_page(&result);
                        results.push(result);
                        continue;
                    }
                },
            };

            // Page sizes may differ within one document
            let rect = region::resolve(page_image.width(), page_image.height(), &region);
            let extraction = self.extractor.extract(&page_image, rect, page_index);
            drop(page_image);

            let crop = if self.settings.retain_crops {
                extraction.crop
            } else {
                None
            };
            let result = PageResult::new(page_index, extraction.number, crop);

            match result.detected_number {
                Some(number) => info!(
                    page = result.page_number(),
                    expected = result.expected_number,
                    detected = number,
                    valid = result.is_valid,
                    "Page checked"
                ),
                None => warn!(
                    page = result.page_number(),
                    expected = result.expected_number,
                    "No page number detected"
                ),
            }

            progress.on_page(&result);
            results.push(result);
        }

        let report = ValidationReport::from_results(results);
        info!(
            total = report.total_pages,
            correct = report.correct_pages,
            errors = report.error_pages,
            "Validation finished: {:.2}% correct",
            report.success_rate
        );
        progress.on_complete(&report);

        Ok(report)
    }
}

fn open_error(path: &Path, error: RasterError) -> PageNumberError {
    match error {
        RasterError::NotFound(path) => PageNumberError::DocumentNotFound {
            path,
            reason: "file does not exist".to_string(),
        },
        RasterError::InvalidDocument { path, reason } => {
            PageNumberError::DocumentNotFound { path, reason }
        }
        RasterError::ToolUnavailable { tool, reason } => PageNumberError::Configuration {
            dependency: tool,
            reason,
            remedy: PDFTOPPM_INSTALL_HINT.to_string(),
        },
        RasterError::IoError(e) => PageNumberError::IoError(e),
        other => PageNumberError::DocumentNotFound {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}
