//! PDFium-backed text layer reader and page rasterizer.
//!
//! `Pdfium` is `!Send`, so every call binds the library and opens the
//! document afresh. `PdfiumBackend` itself holds nothing.

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat};
use pdfium_render::prelude::*;
use tracing::debug;

use super::types::{PdfExtractor, PdfPageRenderer};
use super::AcquisitionError;

pub const DEFAULT_RENDER_DPI: u32 = 300;

/// Explicit path to the PDFium shared library.
const LIB_PATH_ENV: &str = "PDFIUM_DYNAMIC_LIB_PATH";

/// Longest edge of a rendered page, in pixels.
const MAX_RENDER_EDGE: u32 = 4096;

const POINTS_PER_INCH: f32 = 72.0;

pub struct PdfiumBackend;

impl PdfiumBackend {
    /// Fails when no PDFium library can be bound. Looks at
    /// `PDFIUM_DYNAMIC_LIB_PATH`, then next to the executable, then the
    /// system library path.
    pub fn new() -> Result<Self, AcquisitionError> {
        bind()?;
        Ok(Self)
    }
}

fn bind() -> Result<Pdfium, AcquisitionError> {
    if let Ok(path) = std::env::var(LIB_PATH_ENV) {
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| AcquisitionError::PdfParsing(format!("PDFium at {path}: {e}")));
    }

    let beside_exe = std::env::current_exe().ok().and_then(|exe| {
        let dir = exe.parent()?.to_string_lossy().into_owned();
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(dir.as_str());
        Pdfium::bind_to_library(&lib_path).ok()
    });
    if let Some(bindings) = beside_exe {
        return Ok(Pdfium::new(bindings));
    }

    Pdfium::bind_to_system_library().map(Pdfium::new).map_err(|e| {
        AcquisitionError::PdfParsing(format!("PDFium not found (set {LIB_PATH_ENV}): {e}"))
    })
}

fn with_document<T>(
    bytes: &[u8],
    read: impl FnOnce(&PdfDocument<'_>) -> Result<T, AcquisitionError>,
) -> Result<T, AcquisitionError> {
    let pdfium = bind()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(open_error)?;
    read(&document)
}

fn open_error(e: PdfiumError) -> AcquisitionError {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        AcquisitionError::PdfEncrypted
    } else {
        AcquisitionError::PdfParsing(message)
    }
}

/// Pixel size of a page at `dpi`, shrunk uniformly so neither edge
/// exceeds `MAX_RENDER_EDGE`. Never smaller than 1x1.
fn render_size(width_pt: f32, height_pt: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let w = (width_pt * scale).max(1.0);
    let h = (height_pt * scale).max(1.0);
    let shrink = (MAX_RENDER_EDGE as f32 / w.max(h)).min(1.0);
    let edge = |v: f32| ((v * shrink) as u32).clamp(1, MAX_RENDER_EDGE);
    (edge(w), edge(h))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, AcquisitionError> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageOutputFormat::Png)
        .map_err(|e| AcquisitionError::ImageProcessing(format!("PNG encoding: {e}")))?;
    Ok(out.into_inner())
}

impl PdfExtractor for PdfiumBackend {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, AcquisitionError> {
        let pages = with_document(pdf_bytes, |document| {
            document
                .pages()
                .iter()
                .enumerate()
                .map(|(index, page)| {
                    page.text().map(|text| text.all()).map_err(|e| {
                        AcquisitionError::PdfParsing(format!("page {} text: {e}", index + 1))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })?;
        debug!(pages = pages.len(), "Read PDF text layer");
        Ok(pages)
    }
}

impl PdfPageRenderer for PdfiumBackend {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, AcquisitionError> {
        with_document(pdf_bytes, |document| Ok(document.pages().len() as usize))
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, AcquisitionError> {
        let render_error = |reason: String| AcquisitionError::PdfRendering {
            page: page_index,
            reason,
        };

        with_document(pdf_bytes, |document| {
            let pages = document.pages();
            let page = u16::try_from(page_index)
                .ok()
                .and_then(|index| pages.get(index).ok())
                .ok_or_else(|| render_error(format!("document has {} pages", pages.len())))?;

            let (width, height) = render_size(page.width().value, page.height().value, dpi);
            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_maximum_height(height as i32);
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| render_error(e.to_string()))?;

            let png = encode_png(&bitmap.as_image())?;
            debug!(page = page_index + 1, width, height, bytes = png.len(), "Rendered PDF page");
            Ok(png)
        })
    }
}

/// Returns fixed page texts.
pub struct MockPdfExtractor {
    pages: Vec<String>,
}

impl MockPdfExtractor {
    pub fn with_pages(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Behaves like a corrupt file: every call fails.
    pub fn failing() -> FailingPdfExtractor {
        FailingPdfExtractor
    }
}

impl PdfExtractor for MockPdfExtractor {
    fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, AcquisitionError> {
        Ok(self.pages.clone())
    }
}

pub struct FailingPdfExtractor;

impl PdfExtractor for FailingPdfExtractor {
    fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, AcquisitionError> {
        Err(AcquisitionError::PdfParsing("trailer not found".into()))
    }
}

/// Renders `page_count` blank pages.
pub struct MockPdfPageRenderer {
    page_count: usize,
}

impl MockPdfPageRenderer {
    pub fn new(page_count: usize) -> Self {
        Self { page_count }
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, AcquisitionError> {
        Ok(self.page_count)
    }

    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, AcquisitionError> {
        if page_index >= self.page_count {
            return Err(AcquisitionError::PdfRendering {
                page: page_index,
                reason: format!("document has {} pages", self.page_count),
            });
        }
        Ok(minimal_png())
    }
}

/// Small gray PNG standing in for a rendered page.
pub fn minimal_png() -> Vec<u8> {
    let page = image::GrayImage::from_pixel(32, 32, image::Luma([200u8]));
    encode_png(&DynamicImage::ImageLuma8(page)).unwrap_or_default()
}
