use std::sync::atomic::{AtomicUsize, Ordering};

use super::types::{OcrEngine, OcrPageResult};
use super::AcquisitionError;

/// Bundled Tesseract OCR engine.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct BundledTesseract {
    tessdata_dir: std::path::PathBuf,
    languages: String,
}

#[cfg(feature = "ocr")]
impl BundledTesseract {
    /// Initialize with a tessdata directory; `eng.traineddata` must exist.
    pub fn new(tessdata_dir: &std::path::Path) -> Result<Self, AcquisitionError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(AcquisitionError::TessdataNotFound(tessdata_dir.to_path_buf()));
        }

        tracing::info!(tessdata = %tessdata_dir.display(), "Tesseract OCR ready");
        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            languages: "eng".to_string(),
        })
    }

    /// Set language(s) for OCR (e.g., "eng", "eng+fra")
    pub fn with_languages(mut self, langs: &str) -> Self {
        self.languages = langs.to_string();
        self
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for BundledTesseract {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, AcquisitionError> {
        let tessdata_str = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| AcquisitionError::OcrInit("Invalid tessdata path".into()))?;

        let tess = tesseract::Tesseract::new(Some(tessdata_str), Some(&self.languages))
            .map_err(|e| AcquisitionError::OcrInit(format!("{e:?}")))?;

        // Lab values are digits with separators; keep Tesseract from
        // "correcting" them into dictionary words.
        let tess = tess
            .set_variable("load_system_dawg", "0")
            .map_err(|e| AcquisitionError::OcrConfig(format!("{e:?}")))?;

        let mut tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| AcquisitionError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| AcquisitionError::OcrProcessing(format!("{e:?}")))?;

        let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        Ok(OcrPageResult { text, confidence })
    }
}

/// Mock OCR engine for unit testing without Tesseract.
///
/// Returns its texts in turn, one per call, repeating the last one.
pub struct MockOcrEngine {
    texts: Vec<String>,
    confidence: f32,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self::sequence(&[text], confidence)
    }

    pub fn sequence(texts: &[&str], confidence: f32) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            confidence,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, AcquisitionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self
            .texts
            .get(call)
            .or_else(|| self.texts.last())
            .cloned()
            .unwrap_or_default();

        Ok(OcrPageResult {
            text,
            confidence: self.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_ocr_returns_configured_text() {
        let engine = MockOcrEngine::new("Hemoglobin 9.8", 0.92);
        let result = engine.ocr_image(b"fake_image_bytes").unwrap();
        assert_eq!(result.text, "Hemoglobin 9.8");
        assert!((result.confidence - 0.92).abs() < f32::EPSILON);
    }

    #[test]
    fn mock_ocr_sequence_returns_pages_in_turn() {
        let engine = MockOcrEngine::sequence(&["page one", "page two"], 0.8);
        assert_eq!(engine.ocr_image(b"a").unwrap().text, "page one");
        assert_eq!(engine.ocr_image(b"b").unwrap().text, "page two");
        assert_eq!(engine.ocr_image(b"c").unwrap().text, "page two");
        assert_eq!(engine.calls(), 3);
    }

    #[cfg(feature = "ocr")]
    #[test]
    fn bundled_tesseract_rejects_missing_tessdata() {
        let dir = tempfile::tempdir().unwrap();
        let result = BundledTesseract::new(dir.path());
        assert!(matches!(result, Err(AcquisitionError::TessdataNotFound(_))));
    }
}
