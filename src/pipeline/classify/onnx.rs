use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::TensorRef;

use super::types::{ClassifierModel, EncodedLabel, FeatureVector};
use super::{read_json, ClassifierError};

pub const ONNX_MODEL_FILE: &str = "classifier.onnx";
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";

/// Classifier exported to ONNX (e.g. by skl2onnx).
///
/// Requires two files in the model directory:
/// - `classifier.onnx`: one float input of shape `[1, n]`, first output the
///   predicted class index as `i64`, second output the class probabilities
///   as a `[1, classes]` float tensor (export with `zipmap` disabled)
/// - `feature_names.json`: the ordered slot names as a JSON array
///
/// Session is behind a Mutex because `Session::run` takes `&mut self`.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    layout: Vec<String>,
    n_classes: usize,
}

impl OnnxClassifier {
    pub fn load(model_dir: &Path) -> Result<Self, ClassifierError> {
        let model_path = model_dir.join(ONNX_MODEL_FILE);
        if !model_path.exists() {
            return Err(ClassifierError::ArtifactNotFound(model_path));
        }
        let layout: Vec<String> = read_json(&model_dir.join(FEATURE_NAMES_FILE))?;
        if layout.is_empty() {
            return Err(ClassifierError::InvalidModel(
                "feature_names.json is empty".into(),
            ));
        }

        let mut session = Session::builder()
            .map_err(|e: ort::Error| ClassifierError::ModelInit(e.to_string()))?
            .with_intra_threads(1)
            .map_err(|e: ort::Error| ClassifierError::ModelInit(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| ClassifierError::ModelInit(format!("ONNX load failed: {e}")))?;

        let n_classes = warm_up(&mut session, layout.len())?;
        tracing::info!(
            path = %model_path.display(),
            slots = layout.len(),
            classes = n_classes,
            "ONNX classifier loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            layout,
            n_classes,
        })
    }
}

/// Run one all-zero row and read the class count off the probability output.
fn warm_up(session: &mut Session, slots: usize) -> Result<usize, ClassifierError> {
    let input = ndarray::Array2::<f32>::zeros((1, slots));
    let tensor = TensorRef::from_array_view(&input)
        .map_err(|e| ClassifierError::ModelInit(e.to_string()))?;
    let outputs = session
        .run(ort::inputs![tensor])
        .map_err(|e| ClassifierError::ModelInit(format!("ONNX warm-up failed: {e}")))?;

    if outputs.len() < 2 {
        return Err(ClassifierError::InvalidModel(
            "ONNX model has no probability output".into(),
        ));
    }
    let (shape, _) = outputs[1].try_extract_tensor::<f32>().map_err(|e| {
        ClassifierError::InvalidModel(format!("probability output is not a float tensor: {e}"))
    })?;
    shape
        .last()
        .copied()
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| ClassifierError::InvalidModel("probability output has no classes".into()))
}

impl ClassifierModel for OnnxClassifier {
    fn expected_feature_layout(&self) -> &[String] {
        &self.layout
    }

    fn class_count(&self) -> Option<usize> {
        Some(self.n_classes)
    }

    fn predict(&self, features: &FeatureVector<'_>) -> Result<EncodedLabel, ClassifierError> {
        if features.len() != self.layout.len() {
            return Err(ClassifierError::SchemaMismatch(format!(
                "vector has {} slots, model expects {}",
                features.len(),
                self.layout.len()
            )));
        }

        let row: Vec<f32> = features.values().iter().map(|v| *v as f32).collect();
        let input = ndarray::Array2::from_shape_vec((1, row.len()), row)
            .map_err(|e| ClassifierError::Prediction(e.to_string()))?;
        let tensor = TensorRef::from_array_view(&input)
            .map_err(|e| ClassifierError::Prediction(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::Prediction("Session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| ClassifierError::Prediction(format!("ONNX inference failed: {e}")))?;

        let (_, labels) = outputs[0]
            .try_extract_tensor::<i64>()
            .map_err(|e| ClassifierError::Prediction(format!("Output extraction: {e}")))?;
        let label = labels
            .first()
            .copied()
            .ok_or_else(|| ClassifierError::Prediction("model returned no label".into()))?;

        usize::try_from(label)
            .map(EncodedLabel)
            .map_err(|_| ClassifierError::Prediction(format!("negative label {label}")))
    }
}
