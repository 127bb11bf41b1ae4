use serde::{Deserialize, Serialize};

use super::AcquisitionError;

/// What the caller says (or detection decides) the bytes are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// PDF with an embedded text layer.
    NativePdf,
    /// PDF made of page images; needs rasterization + OCR.
    ScannedPdf,
    Image,
    PlainText,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NativePdf => "native_pdf",
            Self::ScannedPdf => "scanned_pdf",
            Self::Image => "image",
            Self::PlainText => "plain_text",
        }
    }

    pub fn needs_ocr(&self) -> bool {
        matches!(self, Self::ScannedPdf | Self::Image)
    }
}

/// How a page's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMethod {
    TextLayer,
    Ocr,
    PlainText,
}

/// Text of a single page, 1-based page number.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub page_number: usize,
    pub text: String,
    pub method: AcquisitionMethod,
}

/// All pages of a document, in page order.
#[derive(Debug, Clone)]
pub struct AcquiredText {
    pub kind: DocumentKind,
    pub pages: Vec<PageText>,
}

impl AcquiredText {
    /// Pages concatenated in order, page boundaries marked by a newline.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Raw OCR result from the engine
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    pub confidence: f32,
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, AcquisitionError>;
}

/// PDF text-layer extraction, one string per page.
pub trait PdfExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, AcquisitionError>;
}

/// Renders individual PDF pages to PNG for OCR.
pub trait PdfPageRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, AcquisitionError>;

    /// `page_index` is 0-based.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, AcquisitionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize, text: &str) -> PageText {
        PageText {
            page_number: n,
            text: text.into(),
            method: AcquisitionMethod::TextLayer,
        }
    }

    #[test]
    fn full_text_joins_pages_with_newline() {
        let acquired = AcquiredText {
            kind: DocumentKind::NativePdf,
            pages: vec![page(1, "Hemoglobin 9.8"), page(2, "WBC: 11200")],
        };
        assert_eq!(acquired.full_text(), "Hemoglobin 9.8\nWBC: 11200");
        assert_eq!(acquired.page_count(), 2);
    }

    #[test]
    fn only_scans_and_images_need_ocr() {
        assert!(DocumentKind::ScannedPdf.needs_ocr());
        assert!(DocumentKind::Image.needs_ocr());
        assert!(!DocumentKind::NativePdf.needs_ocr());
        assert!(!DocumentKind::PlainText.needs_ocr());
    }

    #[test]
    fn traits_are_object_safe() {
        fn _assert_ocr(_: &dyn OcrEngine) {}
        fn _assert_pdf(_: &dyn PdfExtractor) {}
        fn _assert_renderer(_: &dyn PdfPageRenderer) {}
    }
}
