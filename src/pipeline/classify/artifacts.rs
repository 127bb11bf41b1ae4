use std::path::{Path, PathBuf};

use super::forest::ForestModel;
use super::labels::LabelEncoder;
use super::types::ClassifierModel;
use super::ClassifierError;

pub const FOREST_MODEL_FILE: &str = "classifier.json";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.json";

/// Model and label decoder loaded from a model directory.
pub struct ModelArtifacts {
    pub model: Box<dyn ClassifierModel + Send + Sync>,
    pub labels: LabelEncoder,
    pub source: PathBuf,
}

impl std::fmt::Debug for ModelArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifacts")
            .field("slots", &self.model.expected_feature_layout().len())
            .field("labels", &self.labels)
            .field("source", &self.source)
            .finish()
    }
}

type BoxedModel = Box<dyn ClassifierModel + Send + Sync>;

impl ModelArtifacts {
    /// Load `label_encoder.json` plus `classifier.json`, or
    /// `classifier.onnx` when built with `onnx-classifier`.
    pub fn load(model_dir: &Path) -> Result<Self, ClassifierError> {
        let labels = LabelEncoder::load(&model_dir.join(LABEL_ENCODER_FILE))?;

        let forest_path = model_dir.join(FOREST_MODEL_FILE);
        let (model, source): (BoxedModel, PathBuf) = if forest_path.exists() {
            (Box::new(ForestModel::load(&forest_path)?), forest_path)
        } else {
            load_fallback(model_dir, forest_path)?
        };

        check_class_count(model.as_ref(), &labels)?;
        Ok(Self {
            model,
            labels,
            source,
        })
    }
}

/// Every class the model can emit must decode to a label.
fn check_class_count(
    model: &dyn ClassifierModel,
    labels: &LabelEncoder,
) -> Result<(), ClassifierError> {
    match model.class_count() {
        Some(n) if n != labels.len() => Err(ClassifierError::InvalidModel(format!(
            "model predicts {n} classes, label encoder knows {}",
            labels.len()
        ))),
        Some(_) => Ok(()),
        None => {
            tracing::warn!("Model does not report its class count, decoding is checked per request");
            Ok(())
        }
    }
}

#[cfg(feature = "onnx-classifier")]
fn load_fallback(
    model_dir: &Path,
    _forest_path: PathBuf,
) -> Result<(BoxedModel, PathBuf), ClassifierError> {
    let model = super::onnx::OnnxClassifier::load(model_dir)?;
    Ok((Box::new(model), model_dir.join(super::onnx::ONNX_MODEL_FILE)))
}

#[cfg(not(feature = "onnx-classifier"))]
fn load_fallback(
    _model_dir: &Path,
    forest_path: PathBuf,
) -> Result<(BoxedModel, PathBuf), ClassifierError> {
    Err(ClassifierError::ArtifactNotFound(forest_path))
}
