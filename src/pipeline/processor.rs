//! Report processing orchestrator.
//!
//! Single entry point that drives the full pipeline:
//! acquire → segment → locate → normalize → classify → aggregate.
//!
//! Engines and the classifier are injected so the orchestrator runs against
//! mocks in tests. Per-parameter failures become degraded readings; only
//! document-level failures abort a request.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::config::{ConfigError, LabscanConfig};
use crate::models::{
    Demographics, DegradedReason, MissingValuePolicy, ParameterReading, ResponseStatus,
};
use crate::pipeline::acquisition::{AcquisitionError, DocumentKind, TextAcquirer};
use crate::pipeline::classify::{Classifier, ClassifierError, ModelArtifacts};
use crate::pipeline::extraction::{
    locate_parameters, normalize_value, segment_lines, Candidate, Detection, ParameterRegistry,
    RegistryError,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Request-level failures. Anything narrower degrades a single reading.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Document unreadable: {0}")]
    DocumentUnreadable(#[from] AcquisitionError),

    #[error("Processing timed out after {0:?}")]
    Timeout(Duration),

    #[error("Processing worker failed: {0}")]
    Worker(String),
}

/// Failures while assembling a processor from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Parameter registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("Classifier: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("OCR engine initialization failed: {0}")]
    OcrInit(String),
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Wire shape of one request. `results` is absent on error.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ParameterReading>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResponse {
    pub fn completed(results: Vec<ParameterReading>) -> Self {
        Self {
            status: ResponseStatus::Completed,
            results: Some(results),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            results: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }
}

impl From<Result<Vec<ParameterReading>, ProcessingError>> for ExtractionResponse {
    fn from(result: Result<Vec<ParameterReading>, ProcessingError>) -> Self {
        match result {
            Ok(readings) => Self::completed(readings),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs lab documents through the pipeline against a shared, read-only
/// registry and classifier.
pub struct ReportProcessor {
    acquirer: TextAcquirer,
    registry: Arc<ParameterRegistry>,
    classifier: Arc<Classifier>,
    policy: MissingValuePolicy,
    default_demographics: Demographics,
}

impl ReportProcessor {
    /// `classifier` must have been bound against `registry`.
    pub fn new(
        acquirer: TextAcquirer,
        registry: Arc<ParameterRegistry>,
        classifier: Arc<Classifier>,
    ) -> Self {
        Self {
            acquirer,
            registry,
            classifier,
            policy: MissingValuePolicy::default(),
            default_demographics: Demographics::default(),
        }
    }

    pub fn with_policy(mut self, policy: MissingValuePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_default_demographics(mut self, demographics: Demographics) -> Self {
        self.default_demographics = demographics;
        self
    }

    pub fn policy(&self) -> MissingValuePolicy {
        self.policy
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    /// Build a processor with production engines: registry, model artifacts,
    /// PDFium (when the library loads) and Tesseract (with the `ocr` feature).
    pub fn from_config(config: &LabscanConfig) -> Result<Self, StartupError> {
        config.validate()?;

        let registry = match &config.registry_path {
            Some(path) => ParameterRegistry::load(path)?,
            None => ParameterRegistry::blood_panel(),
        };
        let artifacts = ModelArtifacts::load(&config.model_dir)?;
        let classifier = Classifier::from_artifacts(artifacts, &registry)?;

        let acquirer = build_acquirer(config)?;

        tracing::info!(
            parameters = registry.len(),
            slots = classifier.layout().len(),
            policy = %config.missing_value_policy,
            "Report processor ready"
        );

        Ok(Self::new(acquirer, Arc::new(registry), Arc::new(classifier))
            .with_policy(config.missing_value_policy)
            .with_default_demographics(config.default_demographics))
    }

    /// Full pipeline from document bytes. `kind` overrides format detection.
    pub fn process(
        &self,
        bytes: &[u8],
        kind: Option<DocumentKind>,
        demographics: Demographics,
    ) -> Result<Vec<ParameterReading>, ProcessingError> {
        let request_id = Uuid::new_v4();
        tracing::info!(request_id = %request_id, size = bytes.len(), "Processing report");

        let acquired = self.acquirer.acquire(bytes, kind).map_err(|e| {
            tracing::warn!(request_id = %request_id, error = %e, "Document unreadable");
            ProcessingError::DocumentUnreadable(e)
        })?;

        Ok(self.extract_readings(request_id, &acquired.full_text(), demographics))
    }

    /// Pipeline from already-acquired text.
    pub fn process_text(&self, text: &str, demographics: Demographics) -> Vec<ParameterReading> {
        self.extract_readings(Uuid::new_v4(), text, demographics)
    }

    /// Run [`process`](Self::process) on the blocking pool, bounded by `timeout`.
    pub async fn process_with_timeout(
        self: &Arc<Self>,
        bytes: Vec<u8>,
        kind: Option<DocumentKind>,
        demographics: Demographics,
        timeout: Duration,
    ) -> Result<Vec<ParameterReading>, ProcessingError> {
        let processor = Arc::clone(self);
        let task =
            tokio::task::spawn_blocking(move || processor.process(&bytes, kind, demographics));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ProcessingError::Worker(join_error.to_string())),
            Err(_) => {
                tracing::warn!(timeout_secs = timeout.as_secs_f64(), "Report processing timed out");
                Err(ProcessingError::Timeout(timeout))
            }
        }
    }

    fn extract_readings(
        &self,
        request_id: Uuid,
        text: &str,
        demographics: Demographics,
    ) -> Vec<ParameterReading> {
        let demographics = demographics.or(self.default_demographics);
        let detections = locate_parameters(segment_lines(text), &self.registry);

        let mut readings = Vec::with_capacity(detections.len());
        for detection in detections {
            match detection {
                Detection::Found(candidate) => {
                    readings.push(self.read_candidate(request_id, &candidate, demographics));
                }
                Detection::Missing { spec, first_line } => match self.policy {
                    MissingValuePolicy::Placeholder => {
                        tracing::warn!(
                            request_id = %request_id,
                            parameter = spec.name(),
                            line = first_line,
                            "No value near parameter mention"
                        );
                        readings.push(ParameterReading::placeholder(spec.name()));
                    }
                    MissingValuePolicy::Skip => {
                        tracing::debug!(
                            request_id = %request_id,
                            parameter = spec.name(),
                            line = first_line,
                            "No value near parameter mention, skipped"
                        );
                    }
                },
            }
        }

        tracing::info!(
            request_id = %request_id,
            text_length = text.len(),
            readings = readings.len(),
            classified = readings.iter().filter(|r| r.is_classified()).count(),
            "Report processed"
        );
        readings
    }

    fn read_candidate(
        &self,
        request_id: Uuid,
        candidate: &Candidate<'_>,
        demographics: Demographics,
    ) -> ParameterReading {
        let parameter = candidate.spec.name();

        let value = match normalize_value(&candidate.raw_token) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    parameter,
                    line = candidate.source_line,
                    error = %e,
                    "Value unparseable"
                );
                return ParameterReading::degraded(
                    parameter,
                    None,
                    Some(candidate.raw_token.as_str()),
                    DegradedReason::ValueUnparseable,
                );
            }
        };

        match self.classifier.classify(parameter, value, demographics) {
            Ok(status) => {
                tracing::debug!(
                    request_id = %request_id,
                    parameter,
                    lookahead = candidate.used_lookahead,
                    "Parameter classified"
                );
                ParameterReading::classified(parameter, value, &candidate.raw_token, status)
            }
            Err(e) if e.is_schema_mismatch() => {
                tracing::error!(
                    request_id = %request_id,
                    parameter,
                    error = %e,
                    "Feature schema mismatch at request time"
                );
                ParameterReading::degraded(
                    parameter,
                    Some(value),
                    Some(candidate.raw_token.as_str()),
                    DegradedReason::SchemaMismatch,
                )
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    parameter,
                    error = %e,
                    "Prediction failed"
                );
                ParameterReading::degraded(
                    parameter,
                    Some(value),
                    Some(candidate.raw_token.as_str()),
                    DegradedReason::PredictionFailure,
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build the acquirer, respecting feature flags and available libraries.
fn build_acquirer(config: &LabscanConfig) -> Result<TextAcquirer, StartupError> {
    use crate::pipeline::acquisition::pdfium::PdfiumBackend;

    let mut acquirer = TextAcquirer::new(config.acquisition_options());

    match PdfiumBackend::new() {
        Ok(_) => {
            acquirer = acquirer
                .with_pdf_extractor(Box::new(PdfiumBackend))
                .with_pdf_renderer(Box::new(PdfiumBackend));
        }
        Err(e) => {
            tracing::warn!(error = %e, "PDFium unavailable, PDF input will be rejected");
        }
    }

    #[cfg(feature = "ocr")]
    {
        match find_tessdata_dir(config) {
            Some(tessdata) => {
                let engine = crate::pipeline::acquisition::ocr::BundledTesseract::new(&tessdata)
                    .map_err(|e| StartupError::OcrInit(e.to_string()))?
                    .with_languages(&config.ocr_languages);
                acquirer = acquirer.with_ocr_engine(Box::new(engine));
            }
            None => {
                tracing::warn!("Tesseract data not found, scanned input will be rejected");
            }
        }
    }

    #[cfg(not(feature = "ocr"))]
    tracing::info!("Built without OCR, scanned input will be rejected");

    Ok(acquirer)
}

/// Locate tessdata: config, then `TESSDATA_PREFIX`, then common system paths.
#[cfg(feature = "ocr")]
fn find_tessdata_dir(config: &LabscanConfig) -> Option<std::path::PathBuf> {
    use std::path::PathBuf;

    let has_eng = |p: &PathBuf| p.join("eng.traineddata").exists();

    if let Some(dir) = config.tessdata_dir.as_ref().filter(|p| has_eng(*p)) {
        return Some(dir.clone());
    }
    if let Some(p) = std::env::var("TESSDATA_PREFIX")
        .ok()
        .map(PathBuf::from)
        .filter(has_eng)
    {
        return Some(p);
    }

    [
        "/usr/share/tesseract-ocr/5/tessdata",
        "/usr/share/tesseract-ocr/4.00/tessdata",
        "/usr/share/tessdata",
        "/usr/local/share/tessdata",
        "/opt/homebrew/share/tessdata",
    ]
    .iter()
    .map(PathBuf::from)
    .find(has_eng)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
