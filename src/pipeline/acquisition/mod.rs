//! Text acquisition: document bytes -> one ordered text stream.
//!
//! PDFs are read through their text layer or rasterized and OCR'd page by
//! page; images are OCR'd directly. Engines are injected as trait objects so
//! the stage runs against mocks in tests.

pub mod types;
pub mod format;
pub mod sanitize;
pub mod preprocess;
pub mod pdfium;
pub mod ocr;
pub mod orchestrator;

pub use types::*;
pub use format::detect_kind;
pub use sanitize::sanitize_page_text;
pub use orchestrator::{AcquisitionOptions, TextAcquirer};

use std::path::PathBuf;

use thiserror::Error;

/// Document-level failures. Every variant is fatal to the request.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Document is empty")]
    EmptyDocument,

    #[error("Unsupported document format")]
    UnsupportedFormat,

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF is password-protected")]
    PdfEncrypted,

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("No PDF backend configured")]
    PdfUnavailable,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Text encoding error: {0}")]
    Encoding(String),

    #[error("No OCR engine configured")]
    OcrUnavailable,

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("Tesseract OCR configuration error: {0}")]
    OcrConfig(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),
}
