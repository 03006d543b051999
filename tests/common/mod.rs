//! Fake rasterizer and OCR engine shared by the integration tests
//!
//! Pages are 100x100 grayscale images unless sized otherwise. The top
//! tenth carries a header label and the bottom fifth a footer label, both
//! encoded as the gray level. [`LabelOcr`] reads that level back as "Page N".

#![allow(dead_code)]

use image::{DynamicImage, GrayImage, Luma};
use pdf_page_validator::{
    OcrBackend, OcrError, PageSegMode, PageValidator, RasterDocument, RasterError, Rasterizer,
    ValidatorSettings,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Gray level the OCR fake reads as empty text
pub const BLANK: u8 = 0;

/// Gray level the OCR fake fails on
pub const OCR_FAILS: u8 = 255;

pub const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy)]
pub struct FakePage {
    pub header: u8,
    pub footer: u8,
    pub render_fails: bool,
    pub width: u32,
    pub height: u32,
}

impl FakePage {
    pub fn numbered(footer: u8) -> Self {
        Self {
            header: BLANK,
            footer,
            render_fails: false,
            width: PAGE_SIZE,
            height: PAGE_SIZE,
        }
    }

    pub fn with_header(mut self, header: u8) -> Self {
        self.header = header;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn broken() -> Self {
        Self {
            render_fails: true,
            ..Self::numbered(BLANK)
        }
    }
}

/// Open and close counters of a [`FakeRasterizer`]
#[derive(Debug, Default, Clone)]
pub struct Handles {
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl Handles {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct FakeRasterizer {
    pages: Vec<FakePage>,
    handles: Handles,
}

impl FakeRasterizer {
    pub fn new(pages: Vec<FakePage>) -> (Self, Handles) {
        let handles = Handles::default();
        (
            Self {
                pages,
                handles: handles.clone(),
            },
            handles,
        )
    }
}

impl Rasterizer for FakeRasterizer {
    fn open(&self, path: &Path) -> pdf_page_validator::rasterize::Result<Box<dyn RasterDocument>> {
        let name = path.to_string_lossy();
        if name.contains("missing") {
            return Err(RasterError::NotFound(path.to_path_buf()));
        }
        if name.contains("corrupt") {
            return Err(RasterError::InvalidDocument {
                path: path.to_path_buf(),
                reason: "no trailer".to_string(),
            });
        }
        self.handles.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDocument {
            pages: self.pages.clone(),
            closed: Arc::clone(&self.handles.closed),
        }))
    }
}

struct FakeDocument {
    pages: Vec<FakePage>,
    closed: Arc<AtomicUsize>,
}

impl RasterDocument for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render_page(
        &mut self,
        page_index: usize,
        _dpi: u32,
    ) -> pdf_page_validator::rasterize::Result<DynamicImage> {
        let page = self.pages[page_index];
        if page.render_fails {
            return Err(RasterError::RenderFailed {
                page: page_index,
                reason: "broken content stream".to_string(),
            });
        }
        let image = GrayImage::from_fn(page.width, page.height, |_, y| {
            if y < page.height / 10 {
                Luma([page.header])
            } else if y >= page.height * 8 / 10 {
                Luma([page.footer])
            } else {
                Luma([BLANK])
            }
        });
        Ok(DynamicImage::ImageLuma8(image))
    }
}

impl Drop for FakeDocument {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reads the gray level of the crop's first pixel as "Page N"
pub struct LabelOcr {
    pub calls: Arc<AtomicUsize>,
}

impl LabelOcr {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl OcrBackend for LabelOcr {
    fn name(&self) -> &str {
        "label"
    }

    fn recognize(
        &self,
        image: &GrayImage,
        _mode: PageSegMode,
    ) -> pdf_page_validator::ocr::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match image.get_pixel(0, 0).0[0] {
            BLANK => Ok(String::new()),
            OCR_FAILS => Err(OcrError::Failed("engine crashed".to_string())),
            level => Ok(format!("Page {}\n", level)),
        }
    }
}

/// Validator over fake pages
pub fn validator(pages: Vec<FakePage>, settings: ValidatorSettings) -> (PageValidator, Handles) {
    let (rasterizer, handles) = FakeRasterizer::new(pages);
    let validator = PageValidator::new(settings, Box::new(rasterizer), Box::new(LabelOcr::new()))
        .expect("validator without debug dir always builds");
    (validator, handles)
}

/// Validator over pages whose footers read `numbers`
pub fn numbered_validator(numbers: &[u8]) -> (PageValidator, Handles) {
    let pages = numbers.iter().copied().map(FakePage::numbered).collect();
    validator(pages, ValidatorSettings::default())
}
