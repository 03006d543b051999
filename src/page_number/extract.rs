//! Page Number Extraction
//!
//! Crops the footer region, runs OCR on it and pulls an Arabic numeral out of
//! the recognized text.

use image::{DynamicImage, GenericImageView};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use tracing::{debug, error, warn};

use super::region::CropRect;
use super::types::ExtractError;
use crate::ocr::{OcrBackend, PageSegMode};

/// Extraction patterns in priority order, bare digit run first
static PAGE_NUMBER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b([0-9]+)\b",          // 3
        r"Page\s*([0-9]+)",       // Page 3
        r"P\.\s*([0-9]+)",        // P. 3
        r"-\s*([0-9]+)\s*-",      // - 3 -
        r"\.\s*([0-9]+)\s*\.",    // . 3 .
        r"([0-9]+)\s*/\s*[0-9]+", // 3 / 10
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("page number pattern must compile"))
    .collect()
});

/// Recover a page number from raw OCR text.
///
/// Patterns are tried in priority order; the first match of the first
/// pattern that matches at all decides. A match too large for `u32`
/// counts as no number.
pub fn parse_page_number(text: &str) -> Option<u32> {
    PAGE_NUMBER_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .map(|caps| caps[1].parse::<u32>().ok())
    })?
}

/// Result of inspecting one page
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Detected page number
    pub number: Option<u32>,
    /// Region that was passed to OCR (absent only if cropping or OCR failed)
    pub crop: Option<DynamicImage>,
    /// Raw OCR output
    pub raw_text: String,
}

/// Extracts page numbers from rendered pages
pub struct NumberExtractor {
    ocr: Box<dyn OcrBackend>,
    mode: PageSegMode,
    debug_crop_dir: Option<PathBuf>,
}

impl NumberExtractor {
    /// Create an extractor using the given OCR backend
    pub fn new(ocr: Box<dyn OcrBackend>) -> Self {
        Self {
            ocr,
            mode: PageSegMode::SingleBlock,
            debug_crop_dir: None,
        }
    }

    /// Save every inspected crop into `dir`
    #[must_use]
    pub fn with_debug_crop_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_crop_dir = dir;
        self
    }

    /// OCR backend in use
    pub fn backend(&self) -> &dyn OcrBackend {
        self.ocr.as_ref()
    }

    /// Extract the page number inside `rect`.
    ///
    /// Never fails: a bad rectangle or an OCR failure is logged and reported
    /// as "no number, no crop".
    pub fn extract(&self, page: &DynamicImage, rect: CropRect, page_index: usize) -> Extraction {
        match self.try_extract(page, rect, page_index) {
            Ok(extraction) => extraction,
            Err(e @ ExtractError::InvalidRegion { .. }) => {
                warn!(page = page_index + 1, "Skipping page number recognition: {}", e);
                Extraction::default()
            }
            Err(e) => {
                error!(page = page_index + 1, "Page number recognition failed: {}", e);
                Extraction::default()
            }
        }
    }

    fn try_extract(
        &self,
        page: &DynamicImage,
        rect: CropRect,
        page_index: usize,
    ) -> Result<Extraction, ExtractError> {
        let (width, height) = page.dimensions();
        if !rect.fits_within(width, height) {
            return Err(ExtractError::InvalidRegion {
                rect,
                width,
                height,
            });
        }

        // fits_within guarantees non-negative, in-bounds coordinates
        let crop = page.crop_imm(
            rect.left as u32,
            rect.top as u32,
            rect.width(),
            rect.height(),
        );
        self.save_debug_crop(&crop, page_index);

        let gray = crop.to_luma8();
        let raw_text = self.ocr.recognize(&gray, self.mode)?;
        let number = parse_page_number(&raw_text);

        debug!(
            page = page_index + 1,
            text = raw_text.trim(),
            ?number,
            "OCR result"
        );

        Ok(Extraction {
            number,
            crop: Some(crop),
            raw_text,
        })
    }

    fn save_debug_crop(&self, crop: &DynamicImage, page_index: usize) {
        let Some(dir) = &self.debug_crop_dir else {
            return;
        };
        let path = dir.join(format!("page_{}_footer.png", page_index + 1));
        if let Err(e) = crop.save(&path) {
            warn!(path = %path.display(), "Failed to save debug crop: {}", e);
        }
    }
}
