//! Region geometry
//!
//! Converts percentage-based search regions into absolute pixel rectangles.
//! All regions use a top-left origin; the legacy "distance from bottom" form
//! kept in configuration files is converted once, when the config is loaded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================
// Constants
// ============================================================

/// Default horizontal start of the footer region (fraction of page width)
pub const DEFAULT_X_START: f64 = 0.40;

/// Default footer region width (fraction of page width)
pub const DEFAULT_WIDTH: f64 = 0.20;

/// Default distance between the page bottom and the footer region
pub const DEFAULT_FOOTER_Y_START_FROM_BOTTOM: f64 = 0.03;

/// Default footer region height (fraction of page height)
pub const DEFAULT_FOOTER_HEIGHT: f64 = 0.08;

// ============================================================
// Error Types
// ============================================================

/// Region definition errors
#[derive(Debug, Error, PartialEq)]
pub enum RegionError {
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("Invalid region '{0}': expected four comma-separated fractions x_start,width,y_start,height")]
    Parse(String),
}

// ============================================================
// RegionSpec
// ============================================================

/// Rectangle relative to a page image, every field a fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    /// Horizontal start
    pub x_start: f64,
    /// Horizontal width
    pub width: f64,
    /// Vertical start, measured from the top edge
    pub y_start: f64,
    /// Vertical height
    pub height: f64,
}

impl RegionSpec {
    /// Create a region from top-left origin fractions
    pub const fn new(x_start: f64, width: f64, y_start: f64, height: f64) -> Self {
        Self {
            x_start,
            width,
            y_start,
            height,
        }
    }

    /// Create a region from the legacy footer form, where the vertical
    /// position is given as the distance between the page bottom and the
    /// bottom edge of the region.
    pub fn from_footer(
        x_start: f64,
        width: f64,
        footer_y_start_from_bottom: f64,
        footer_height: f64,
    ) -> Self {
        Self {
            x_start,
            width,
            y_start: 1.0 - footer_height - footer_y_start_from_bottom,
            height: footer_height,
        }
    }

    /// Check that every field lies within `[0, 1]`.
    ///
    /// Degenerate regions (zero width, or extending past the page edge) pass
    /// this check and resolve to "no number detected" on every page.
    pub fn validate(&self) -> Result<(), RegionError> {
        let fields = [
            ("x_start", self.x_start),
            ("width", self.width),
            ("y_start", self.y_start),
            ("height", self.height),
        ];
        for (field, value) in fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(RegionError::OutOfRange { field, value });
            }
        }
        Ok(())
    }
}

impl Default for RegionSpec {
    fn default() -> Self {
        Self::from_footer(
            DEFAULT_X_START,
            DEFAULT_WIDTH,
            DEFAULT_FOOTER_Y_START_FROM_BOTTOM,
            DEFAULT_FOOTER_HEIGHT,
        )
    }
}

impl FromStr for RegionSpec {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<f64> = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| RegionError::Parse(s.to_string()))?;

        match values.as_slice() {
            [x_start, width, y_start, height] => {
                let spec = Self::new(*x_start, *width, *y_start, *height);
                spec.validate()?;
                Ok(spec)
            }
            _ => Err(RegionError::Parse(s.to_string())),
        }
    }
}

impl fmt::Display for RegionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x={:.2} w={:.2} y={:.2} h={:.2}",
            self.x_start, self.width, self.y_start, self.height
        )
    }
}

// ============================================================
// CropRect
// ============================================================

/// Absolute pixel rectangle `(left, top, right, bottom)`.
///
/// Coordinates are signed so that a region computed from a bad spec can be
/// represented and rejected instead of silently clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl CropRect {
    /// Rectangle width in pixels (zero if degenerate)
    pub fn width(&self) -> u32 {
        u32::try_from(self.right - self.left).unwrap_or(0)
    }

    /// Rectangle height in pixels (zero if degenerate)
    pub fn height(&self) -> u32 {
        u32::try_from(self.bottom - self.top).unwrap_or(0)
    }

    /// True if `0 <= left < right <= width` and `0 <= top < bottom <= height`
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        0 <= self.left
            && self.left < self.right
            && self.right <= i64::from(image_width)
            && 0 <= self.top
            && self.top < self.bottom
            && self.bottom <= i64::from(image_height)
    }
}

impl fmt::Display for CropRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Resolve a region into pixel coordinates for an image of the given size.
///
/// Never fails; a rectangle outside the image is returned as-is and rejected
/// by the extractor.
pub fn resolve(image_width: u32, image_height: u32, spec: &RegionSpec) -> CropRect {
    let w = f64::from(image_width);
    let h = f64::from(image_height);

    CropRect {
        left: (w * spec.x_start).round() as i64,
        top: (h * spec.y_start).round() as i64,
        right: (w * (spec.x_start + spec.width)).round() as i64,
        bottom: (h * (spec.y_start + spec.height)).round() as i64,
    }
}
