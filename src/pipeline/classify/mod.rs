//! Classification of located values against a pre-trained model.
//!
//! The model's declared feature layout is negotiated once against the
//! parameter registry (`SchemaBinding`); every request builds its vectors
//! through that binding and the decoded label becomes the reading status.

pub mod types;
pub mod schema;
pub mod labels;
pub mod forest;
pub mod artifacts;
pub mod adapter;
#[cfg(feature = "onnx-classifier")]
pub mod onnx;

pub use types::*;
pub use schema::SchemaBinding;
pub use labels::LabelEncoder;
pub use forest::ForestModel;
pub use artifacts::ModelArtifacts;
pub use adapter::{Classifier, StubModel};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Feature schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Encoded label {0} is not known to the label decoder")]
    UnknownLabel(usize),

    #[error("Model artifact not found: {0}")]
    ArtifactNotFound(PathBuf),

    #[error("Cannot read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Model initialization failed: {0}")]
    ModelInit(String),
}

impl ClassifierError {
    /// Schema mismatches are deployment bugs; everything else at request
    /// time is a plain prediction failure.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::SchemaMismatch(_))
    }
}

/// Read and parse a JSON artifact.
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
) -> Result<T, ClassifierError> {
    if !path.exists() {
        return Err(ClassifierError::ArtifactNotFound(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ClassifierError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ClassifierError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
