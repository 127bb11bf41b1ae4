use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::{EncodedLabel, LabelDecoder};
use super::{read_json, ClassifierError};

/// Class names in encoder order; index `i` decodes label `i`.
///
/// Mirrors a fitted label encoder: classes are stored sorted, so the
/// training labels `High`, `Low`, `Normal` encode as 0, 1, 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self, ClassifierError> {
        if classes.is_empty() {
            return Err(ClassifierError::InvalidModel(
                "label encoder has no classes".into(),
            ));
        }
        if classes.iter().any(|c| c.trim().is_empty()) {
            return Err(ClassifierError::InvalidModel(
                "label encoder has an empty class name".into(),
            ));
        }
        Ok(Self { classes })
    }

    /// Load `{"classes": [...]}`.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let raw: LabelEncoder = read_json(path)?;
        Self::new(raw.classes)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl LabelDecoder for LabelEncoder {
    fn decode(&self, label: EncodedLabel) -> Result<String, ClassifierError> {
        self.classes
            .get(label.0)
            .cloned()
            .ok_or(ClassifierError::UnknownLabel(label.0))
    }
}
