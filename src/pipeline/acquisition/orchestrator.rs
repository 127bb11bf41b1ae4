use super::pdfium::DEFAULT_RENDER_DPI;
use super::preprocess::prepare_for_ocr;
use super::sanitize::sanitize_page_text;
use super::types::{
    AcquiredText, AcquisitionMethod, DocumentKind, OcrEngine, PageText, PdfExtractor,
    PdfPageRenderer,
};
use super::{detect_kind, AcquisitionError};

/// Native PDF pages with less text than this are OCR'd instead, when an
/// OCR engine and renderer are configured.
pub const DEFAULT_OCR_FALLBACK_MIN_CHARS: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct AcquisitionOptions {
    pub render_dpi: u32,
    pub ocr_fallback_min_chars: usize,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self {
            render_dpi: DEFAULT_RENDER_DPI,
            ocr_fallback_min_chars: DEFAULT_OCR_FALLBACK_MIN_CHARS,
        }
    }
}

/// Turns document bytes into page texts.
/// Uses trait objects for OCR and PDF access, enabling dependency injection.
pub struct TextAcquirer {
    pdf_extractor: Option<Box<dyn PdfExtractor + Send + Sync>>,
    pdf_renderer: Option<Box<dyn PdfPageRenderer + Send + Sync>>,
    ocr_engine: Option<Box<dyn OcrEngine + Send + Sync>>,
    options: AcquisitionOptions,
}

impl TextAcquirer {
    pub fn new(options: AcquisitionOptions) -> Self {
        Self {
            pdf_extractor: None,
            pdf_renderer: None,
            ocr_engine: None,
            options,
        }
    }

    pub fn with_pdf_extractor(mut self, extractor: Box<dyn PdfExtractor + Send + Sync>) -> Self {
        self.pdf_extractor = Some(extractor);
        self
    }

    /// Add a PDF page renderer for per-page OCR of scanned PDFs.
    pub fn with_pdf_renderer(mut self, renderer: Box<dyn PdfPageRenderer + Send + Sync>) -> Self {
        self.pdf_renderer = Some(renderer);
        self
    }

    pub fn with_ocr_engine(mut self, engine: Box<dyn OcrEngine + Send + Sync>) -> Self {
        self.ocr_engine = Some(engine);
        self
    }

    /// Acquire all page texts. `declared` wins over magic-byte detection.
    pub fn acquire(
        &self,
        bytes: &[u8],
        declared: Option<DocumentKind>,
    ) -> Result<AcquiredText, AcquisitionError> {
        if bytes.is_empty() {
            return Err(AcquisitionError::EmptyDocument);
        }

        let kind = match declared {
            Some(kind) => kind,
            None => self.route_detected(detect_kind(bytes)?),
        };

        tracing::info!(kind = kind.as_str(), size = bytes.len(), "Starting text acquisition");

        let mut pages = match kind {
            DocumentKind::NativePdf => self.read_text_layer(bytes)?,
            DocumentKind::ScannedPdf => self.ocr_pdf_pages(bytes)?,
            DocumentKind::Image => {
                let ocr = self.ocr()?;
                let prepared = prepare_for_ocr(bytes, true)?;
                let result = ocr.ocr_image(&prepared)?;
                tracing::debug!(confidence = result.confidence, "Image OCR complete");
                vec![PageText {
                    page_number: 1,
                    text: result.text,
                    method: AcquisitionMethod::Ocr,
                }]
            }
            DocumentKind::PlainText => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| AcquisitionError::Encoding(e.to_string()))?;
                vec![PageText {
                    page_number: 1,
                    text: text.to_string(),
                    method: AcquisitionMethod::PlainText,
                }]
            }
        };

        for page in &mut pages {
            page.text = sanitize_page_text(&page.text);
        }

        tracing::info!(
            kind = kind.as_str(),
            pages = pages.len(),
            text_length = pages.iter().map(|p| p.text.len()).sum::<usize>(),
            "Text acquisition complete"
        );

        Ok(AcquiredText { kind, pages })
    }

    /// Undeclared PDFs go through the text layer whenever an extractor is
    /// configured. Sparse pages still fall back to OCR there.
    fn route_detected(&self, detected: DocumentKind) -> DocumentKind {
        if detected == DocumentKind::ScannedPdf && self.pdf_extractor.is_some() {
            tracing::debug!("No visible text operators, trying the PDF text layer first");
            return DocumentKind::NativePdf;
        }
        detected
    }

    fn ocr(&self) -> Result<&(dyn OcrEngine + Send + Sync), AcquisitionError> {
        self.ocr_engine.as_deref().ok_or(AcquisitionError::OcrUnavailable)
    }

    fn renderer(&self) -> Result<&(dyn PdfPageRenderer + Send + Sync), AcquisitionError> {
        self.pdf_renderer.as_deref().ok_or(AcquisitionError::PdfUnavailable)
    }

    /// Text layer first; near-empty pages fall back to OCR when possible.
    fn read_text_layer(&self, bytes: &[u8]) -> Result<Vec<PageText>, AcquisitionError> {
        let extractor = self
            .pdf_extractor
            .as_deref()
            .ok_or(AcquisitionError::PdfUnavailable)?;
        let texts = extractor.extract_pages(bytes)?;

        let mut pages = Vec::with_capacity(texts.len());
        for (index, text) in texts.into_iter().enumerate() {
            if text.trim().chars().count() < self.options.ocr_fallback_min_chars {
                if let Some(ocr_text) = self.try_ocr_fallback(bytes, index) {
                    pages.push(PageText {
                        page_number: index + 1,
                        text: ocr_text,
                        method: AcquisitionMethod::Ocr,
                    });
                    continue;
                }
            }
            pages.push(PageText {
                page_number: index + 1,
                text,
                method: AcquisitionMethod::TextLayer,
            });
        }
        Ok(pages)
    }

    fn try_ocr_fallback(&self, bytes: &[u8], page_index: usize) -> Option<String> {
        let (renderer, ocr) = match (self.pdf_renderer.as_deref(), self.ocr_engine.as_deref()) {
            (Some(r), Some(o)) => (r, o),
            _ => return None,
        };

        let result = renderer
            .render_page(bytes, page_index, self.options.render_dpi)
            .and_then(|png| prepare_for_ocr(&png, false))
            .and_then(|prepared| ocr.ocr_image(&prepared));

        match result {
            Ok(r) => {
                tracing::debug!(page = page_index + 1, "Sparse text layer, used OCR");
                Some(r.text)
            }
            Err(e) => {
                tracing::warn!(page = page_index + 1, error = %e, "OCR fallback failed, keeping text layer");
                None
            }
        }
    }

    /// Rasterize every page and OCR it, in page order.
    fn ocr_pdf_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, AcquisitionError> {
        let ocr = self.ocr()?;
        let renderer = self.renderer()?;
        let count = renderer.page_count(bytes)?;

        let mut pages = Vec::with_capacity(count);
        for index in 0..count {
            let png = renderer.render_page(bytes, index, self.options.render_dpi)?;
            let prepared = prepare_for_ocr(&png, false)?;
            let result = ocr.ocr_image(&prepared)?;
            tracing::debug!(page = index + 1, confidence = result.confidence, "Page OCR complete");
            pages.push(PageText {
                page_number: index + 1,
                text: result.text,
                method: AcquisitionMethod::Ocr,
            });
        }
        Ok(pages)
    }
}
